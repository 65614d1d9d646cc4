use super::heap::Heap;
use super::metrics::{GcState, Metrics};
use super::roots::RootSource;
use super::table::SweepStats;
use super::trace::Tracer;
use log::{debug, warn};
use std::time::{Duration, Instant};

/// What a completed cycle did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CycleStats {
    /// Blocks found reachable.
    pub marked: usize,
    /// Words tested as candidate addresses.
    pub scanned_words: usize,
    pub freed: SweepStats,
    pub duration: Duration,
}

/// Anything that can run a full collection cycle on demand.
pub trait Collect: Send + Sync + 'static {
    /// Runs a cycle. `marked` is called once the roots are no longer needed:
    /// after marking, or when the cycle is skipped.
    fn collect_cycle<F: FnOnce()>(&self, marked: F) -> Result<Option<CycleStats>, crate::GcError>;

    /// Called each time the background collector's period elapses.
    fn collect_periodic(&self) -> Result<(), crate::GcError>;
}

/// Runs one stop-the-mutator cycle: scan the roots, unmark, mark everything
/// transitively reachable from the roots, sweep the rest.
///
/// The caller must hold the collector lock for the whole call, which is what
/// `&mut Heap` stands for. Returns `None` without touching the heap if the
/// roots can't provide a window, since sweeping against an empty root set
/// would free every live block. `marked` runs before the sweep, or right
/// away on a skip; a parked root source may resume from that point on.
pub fn collect<R, F>(
    heap: &mut Heap,
    roots: &R,
    scan_registers: bool,
    metrics: &Metrics,
    marked: F,
) -> Option<CycleStats>
where
    R: RootSource + ?Sized,
    F: FnOnce(),
{
    let start_time = Instant::now();

    metrics.set_state(GcState::RootScan);
    let window = match roots.capture(scan_registers) {
        Some(window) => window,
        None => {
            warn!("no root window available, skipping collection");
            metrics.record_skip();
            metrics.set_state(GcState::Idle);
            marked();
            return None;
        }
    };

    debug!(
        "beginning collection: {} blocks tracked, {} stack words, {} values",
        heap.table().len(),
        window.stack_words(),
        window.values.len()
    );

    metrics.set_state(GcState::Unmarking);
    heap.table_mut().unmark_all();

    metrics.set_state(GcState::Marking);
    let mut tracer = Tracer::new(heap.table_mut());

    // SAFETY: the window is either this thread's own stack above the frame
    // that captured it, or a window its owner keeps parked until `marked`.
    unsafe { tracer.trace_roots(&window) };

    let marked_blocks = tracer.trace_loop();
    let scanned_words = tracer.get_scanned_words();

    marked();

    metrics.set_state(GcState::Sweeping);
    let freed = heap.table_mut().sweep_unmarked();

    let duration = start_time.elapsed();

    metrics.record_cycle(
        duration.as_millis() as u64,
        freed.blocks as u64,
        freed.bytes as u64,
    );
    metrics.observe(heap.table());
    metrics.set_state(GcState::Idle);

    debug!(
        "collection complete: marked {}, freed {} blocks ({} bytes) in {:?}",
        marked_blocks, freed.blocks, freed.bytes, duration
    );

    Some(CycleStats {
        marked: marked_blocks,
        scanned_words,
        freed,
        duration,
    })
}
