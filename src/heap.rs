use super::block::Block;
use super::config::GcConfig;
use super::error::{AllocError, GcError};
use super::table::AllocationTable;
use log::trace;

/// The tracked heap: every block handed out by the allocation calls lives in
/// the allocation table until it is released or swept.
///
/// Nothing here synchronizes; [`crate::Gc`] only ever reaches the heap
/// through its lock.
pub struct Heap {
    table: AllocationTable,
}

impl Heap {
    pub fn new(config: &GcConfig) -> Result<Self, GcError> {
        Ok(Self {
            table: AllocationTable::from_config(config)?,
        })
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut AllocationTable {
        &mut self.table
    }

    pub fn allocate(&mut self, size: usize) -> Result<*mut u8, GcError> {
        let block = Block::new(size)?;
        let ptr = block.as_ptr();

        self.table.insert(block)?;

        trace!("allocated {:?} ({} bytes)", ptr, size);

        Ok(ptr)
    }

    /// Blocks are always handed out zeroed, so this only differs from
    /// [`Heap::allocate`] in how the size is given.
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Result<*mut u8, GcError> {
        let total = count.checked_mul(size).ok_or(AllocError::BadRequest)?;

        self.allocate(total)
    }

    /// Resizes a tracked block, which may move it. A null pointer behaves
    /// like a fresh allocation.
    pub fn reallocate(&mut self, ptr: *mut u8, size: usize) -> Result<*mut u8, GcError> {
        if ptr.is_null() {
            return self.allocate(size);
        }

        let new_addr = self
            .table
            .replace(ptr as usize, |block| block.resize(size))?;

        trace!("reallocated {:?} -> {:#x} ({} bytes)", ptr, new_addr, size);

        Ok(new_addr as *mut u8)
    }

    /// Frees a tracked block. Releasing null does nothing; releasing anything
    /// else that is not tracked, including a block released before, is an
    /// error.
    pub fn release(&mut self, ptr: *mut u8) -> Result<(), GcError> {
        if ptr.is_null() {
            return Ok(());
        }

        if !self.table.remove(ptr as usize) {
            return Err(GcError::UntrackedPointer(ptr as usize));
        }

        trace!("released {:?}", ptr);

        Ok(())
    }

    pub fn find(&self, ptr: *const u8) -> Option<usize> {
        self.table.find(ptr as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::new(&GcConfig::default()).unwrap()
    }

    #[test]
    fn allocation_is_tracked_and_writable() {
        let mut heap = heap();

        for size in [1, 7, 8, 100, 4096] {
            let ptr = heap.allocate(size).unwrap();

            assert_eq!(heap.find(ptr), Some(size));

            unsafe { ptr.write_bytes(0xFF, size) };
        }
    }

    #[test]
    fn zero_allocate_multiplies() {
        let mut heap = heap();
        let ptr = heap.zero_allocate(4, 12).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(ptr, 48) };

        assert_eq!(heap.find(ptr), Some(48));
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(
            heap.zero_allocate(usize::MAX, 2),
            Err(GcError::Alloc(AllocError::BadRequest))
        );
    }

    #[test]
    fn release_twice_is_detected() {
        let mut heap = heap();
        let ptr = heap.allocate(16).unwrap();

        assert!(heap.release(ptr).is_ok());
        assert_eq!(heap.find(ptr), None);
        assert_eq!(heap.release(ptr), Err(GcError::UntrackedPointer(ptr as usize)));
        assert!(heap.release(std::ptr::null_mut()).is_ok());
    }

    #[test]
    fn reallocate_moves_tracking() {
        let mut heap = heap();
        let ptr = heap.allocate(16).unwrap();

        unsafe { ptr.write_bytes(0x11, 16) };

        let grown = heap.reallocate(ptr, 1 << 20).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(grown, 1 << 20) };

        assert_eq!(heap.find(grown), Some(1 << 20));
        assert!(bytes[..16].iter().all(|b| *b == 0x11));
        assert!(bytes[16..].iter().all(|b| *b == 0));

        if grown != ptr {
            assert_eq!(heap.find(ptr), None);
        }

        assert_eq!(heap.table().len(), 1);
    }

    #[test]
    fn reallocate_untracked() {
        let mut heap = heap();
        let local = 0usize;
        let ptr = &local as *const usize as *mut u8;

        assert_eq!(
            heap.reallocate(ptr, 8),
            Err(GcError::UntrackedPointer(ptr as usize))
        );

        let fresh = heap.reallocate(std::ptr::null_mut(), 8).unwrap();
        assert_eq!(heap.find(fresh), Some(8));
    }
}
