use super::trace_job::TraceJob;
use crate::roots::RootWindow;
use crate::table::AllocationTable;
use log::trace;

/// Conservative marker.
///
/// Every word it is handed is a candidate address. A candidate that is the
/// start of a tracked, still unmarked block marks that block and queues its
/// bytes to be scanned in turn. Blocks are marked before they are queued so
/// each block is scanned at most once per cycle.
pub struct Tracer<'t> {
    table: &'t mut AllocationTable,
    work: Vec<TraceJob>,
    mark_count: usize,
    scanned_words: usize,
}

impl<'t> Tracer<'t> {
    pub fn new(table: &'t mut AllocationTable) -> Self {
        Self {
            table,
            work: vec![],
            mark_count: 0,
            scanned_words: 0,
        }
    }

    pub fn get_scanned_words(&self) -> usize {
        self.scanned_words
    }

    /// Tests one candidate address.
    pub fn trace(&mut self, candidate: usize) {
        self.scanned_words += 1;

        let Some((addr, size)) = self.table.mark_candidate(candidate) else {
            return;
        };

        trace!("marked block {:#x} ({} bytes)", addr, size);

        self.mark_count += 1;

        let job = TraceJob::new(addr, size);

        if !job.is_empty() {
            self.work.push(job);
        }
    }

    /// Queues the roots of a cycle: values are tested right away, the stack
    /// range is scanned like any other.
    ///
    /// # Safety
    ///
    /// The window's stack range must be readable until [`Tracer::trace_loop`]
    /// returns.
    pub unsafe fn trace_roots(&mut self, window: &RootWindow) {
        for &word in window.values.iter() {
            self.trace(word);
        }

        let stack = TraceJob::from_range(window.stack.clone());

        if !stack.is_empty() {
            self.scan(stack);
        }
    }

    /// Scans queued blocks until no newly marked block is left.
    pub fn trace_loop(&mut self) -> usize {
        while let Some(job) = self.work.pop() {
            // SAFETY: queued jobs are tracked blocks, which the exclusive
            // borrow of the table keeps alive.
            unsafe { self.scan(job) };
        }

        debug_assert_eq!(self.work.len(), 0);

        self.mark_count
    }

    unsafe fn scan(&mut self, job: TraceJob) {
        for word in job.words() {
            self.trace(word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;

    fn track(table: &mut AllocationTable, size: usize) -> *mut usize {
        let block = Block::new(size).unwrap();
        let ptr = block.as_ptr() as *mut usize;

        table.insert(block).unwrap();

        ptr
    }

    #[test]
    fn follows_chains_and_cycles() {
        let mut table = AllocationTable::new(257, 0.74).unwrap();
        let a = track(&mut table, 16);
        let b = track(&mut table, 16);
        let c = track(&mut table, 16);
        let lost = track(&mut table, 16);

        // a -> b -> c -> a, lost -> a
        unsafe {
            *a = b as usize;
            *b = c as usize;
            *c = a as usize;
            *lost = a as usize;
        }

        let roots = [a as usize];
        let mut tracer = Tracer::new(&mut table);

        unsafe { tracer.scan(TraceJob::new(roots.as_ptr() as usize, std::mem::size_of_val(&roots))) };
        let marked = tracer.trace_loop();

        assert_eq!(marked, 3);
        assert_eq!(table.is_marked(a as usize), Ok(true));
        assert_eq!(table.is_marked(b as usize), Ok(true));
        assert_eq!(table.is_marked(c as usize), Ok(true));
        assert_eq!(table.is_marked(lost as usize), Ok(false));
    }

    #[test]
    fn interior_pointers_are_not_references() {
        let mut table = AllocationTable::new(257, 0.74).unwrap();
        let a = track(&mut table, 32);
        let mut tracer = Tracer::new(&mut table);

        tracer.trace(a as usize + 8);
        tracer.trace_loop();

        assert_eq!(table.is_marked(a as usize), Ok(false));
    }

    #[test]
    fn values_are_roots() {
        let mut table = AllocationTable::new(257, 0.74).unwrap();
        let a = track(&mut table, 8);
        let window = RootWindow::from_values(vec![0, a as usize]);
        let mut tracer = Tracer::new(&mut table);

        unsafe { tracer.trace_roots(&window) };

        assert_eq!(tracer.trace_loop(), 1);
        assert_eq!(tracer.get_scanned_words(), 2);
    }
}
