use super::collector::{collect, Collect, CycleStats};
use super::config::{GcConfig, MIN_COLLECT_INTERVAL};
use super::error::GcError;
use super::heap::Heap;
use super::metrics::{GcMetrics, Metrics};
use super::monitor::Monitor;
use super::roots::{RootSource, ThreadStack};
use super::sync::GcLock;

use log::{debug, error};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Everything a collection needs, shared between the context object and the
// background task.
struct Shared<R: RootSource + 'static> {
    heap: GcLock<Heap>,
    roots: R,
    metrics: Metrics,
    scan_registers: bool,
    // a periodic cycle waiting for the owner of the roots to hand them over
    pending: AtomicBool,
}

impl<R: RootSource + 'static> Collect for Shared<R> {
    fn collect_cycle<F: FnOnce()>(&self, marked: F) -> Result<Option<CycleStats>, GcError> {
        let mut heap = self.heap.acquire()?;

        Ok(collect(
            &mut *heap,
            &self.roots,
            self.scan_registers,
            &self.metrics,
            marked,
        ))
    }

    fn collect_periodic(&self) -> Result<(), GcError> {
        if self.roots.needs_handshake() {
            self.pending.store(true, Ordering::Release);
            return Ok(());
        }

        self.collect_cycle(|| {}).map(|_| ())
    }
}

/// A conservative garbage collector over the system allocator.
///
/// Memory handed out by [`Gc::allocate`] and friends is tracked until it is
/// released, or until a collection finds that nothing in the root window
/// (and nothing reachable from it) holds its start address anymore.
///
/// ```rust
/// use sweepit::{Gc, GcConfig};
///
/// let gc = Gc::new(GcConfig::default()).unwrap();
/// let ptr = gc.allocate(16).unwrap();
///
/// assert_eq!(gc.find(ptr), Some(16));
///
/// gc.release(ptr).unwrap();
///
/// assert_eq!(gc.find(ptr), None);
/// ```
///
/// A collector built with [`Gc::new`] scans the stack of the thread that
/// built it, so it must be built near the top of that thread's stack, before
/// anything it should keep alive is stored.
pub struct Gc<R: RootSource + 'static = ThreadStack> {
    shared: Arc<Shared<R>>,
    monitor: Monitor<Shared<R>>,
    config: GcConfig,
}

impl Gc<ThreadStack> {
    #[inline(always)]
    pub fn new(config: GcConfig) -> Result<Self, GcError> {
        Self::with_roots(config, ThreadStack::new())
    }
}

impl<R: RootSource + 'static> Gc<R> {
    /// Builds a collector that reads its roots from `roots`. If the config
    /// sets an interval the background collector starts right away.
    pub fn with_roots(config: GcConfig, roots: R) -> Result<Self, GcError> {
        let period = Duration::from_secs(config.interval.max(MIN_COLLECT_INTERVAL));

        Self::build(config, roots, period)
    }

    fn build(config: GcConfig, roots: R, period: Duration) -> Result<Self, GcError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            heap: GcLock::new(Heap::new(&config)?),
            roots,
            metrics: Metrics::new(),
            scan_registers: config.scan_registers,
            pending: AtomicBool::new(false),
        });
        let monitor = Monitor::new(shared.clone(), period);

        if let Ok(heap) = shared.heap.acquire() {
            shared.metrics.observe(heap.table());
        }

        let gc = Self {
            shared,
            monitor,
            config,
        };

        if config.is_automatic() {
            gc.start_monitor()?;
        }

        Ok(gc)
    }

    #[cfg(test)]
    pub(crate) fn with_period(config: GcConfig, roots: R, period: Duration) -> Result<Self, GcError> {
        Self::build(config, roots, period)
    }

    /// Runs `f` on the heap under the guard.
    ///
    /// This is the owner's safepoint: a periodic cycle that was waiting for
    /// its roots runs first, and the roots stay parked while this thread
    /// waits for the guard.
    fn with_heap<F, O>(&self, f: F) -> Result<O, GcError>
    where
        F: FnOnce(&mut Heap) -> Result<O, GcError>,
    {
        if self.shared.roots.can_park() && self.shared.pending.swap(false, Ordering::AcqRel) {
            debug!("handing the roots to a pending periodic collection");
            self.collect()?;
        }

        self.shared.roots.park();
        let heap = self.shared.heap.acquire();
        self.shared.roots.unpark();

        let mut heap = heap?;
        let result = f(&mut *heap);

        self.shared.metrics.observe(heap.table());

        result
    }

    /// Returns a zeroed block of at least `size` bytes, aligned to a word.
    pub fn allocate(&self, size: usize) -> Result<*mut u8, GcError> {
        self.with_heap(|heap| heap.allocate(size))
    }

    /// Returns a zeroed block for `count` elements of `size` bytes each.
    pub fn zero_allocate(&self, count: usize, size: usize) -> Result<*mut u8, GcError> {
        self.with_heap(|heap| heap.zero_allocate(count, size))
    }

    /// Resizes a tracked block, returning its possibly moved address. The
    /// old address stops being tracked when the block moves. Reallocating a
    /// null pointer is the same as allocating.
    pub fn reallocate(&self, ptr: *mut u8, size: usize) -> Result<*mut u8, GcError> {
        self.with_heap(|heap| heap.reallocate(ptr, size))
    }

    /// Frees a tracked block right away. Releasing a pointer that is not
    /// tracked, including one that has already been released or collected,
    /// returns [`GcError::UntrackedPointer`].
    pub fn release(&self, ptr: *mut u8) -> Result<(), GcError> {
        self.with_heap(|heap| heap.release(ptr))
    }

    /// Requests a collection. With the background collector running, the
    /// calling thread parks its roots, waits until the cycle has marked from
    /// them and returns `Ok(None)` while the sweep goes on in the background.
    /// Otherwise the cycle runs on the calling thread before this returns.
    pub fn collect(&self) -> Result<Option<CycleStats>, GcError> {
        if !self.monitor.is_running() {
            return self.collect_blocking();
        }

        self.shared.roots.park();
        let marked = self
            .monitor
            .request()
            .map(|ack| ack.map(|ack| ack.recv().is_ok()));
        self.shared.roots.unpark();

        match marked? {
            Some(true) => Ok(None),
            // the background collector stopped before taking the roots
            _ => self.collect_blocking(),
        }
    }

    /// Runs a full cycle on the calling thread, even if the background
    /// collector is running. Returns `None` if the cycle had to be skipped
    /// because no root window could be taken.
    pub fn collect_blocking(&self) -> Result<Option<CycleStats>, GcError> {
        self.shared.collect_cycle(|| {})
    }

    /// Blocks until no collection holds the guard.
    pub fn wait_for_collection(&self) {
        let _heap = self.shared.heap.acquire();
    }

    /// The size a tracked block was requested with, or `None` if `ptr` is
    /// not the start of a tracked block.
    pub fn find<T>(&self, ptr: *const T) -> Option<usize> {
        let heap = self.shared.heap.acquire().ok()?;

        heap.find(ptr as *const u8)
    }

    /// Whether the most recent completed cycle found the block reachable. A
    /// skipped cycle leaves marks as they were. `None` if `ptr` is not
    /// tracked.
    pub fn is_marked<T>(&self, ptr: *const T) -> Option<bool> {
        let heap = self.shared.heap.acquire().ok()?;

        heap.table().is_marked(ptr as usize).ok()
    }

    pub fn len(&self) -> usize {
        self.shared
            .heap
            .acquire()
            .map(|heap| heap.table().len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tracked_bytes(&self) -> usize {
        self.shared
            .heap
            .acquire()
            .map(|heap| heap.table().tracked_bytes())
            .unwrap_or(0)
    }

    pub fn start_monitor(&self) -> Result<(), GcError> {
        self.monitor.start()
    }

    pub fn stop_monitor(&self) -> Result<(), GcError> {
        self.monitor.stop()
    }

    pub fn is_monitor_running(&self) -> bool {
        self.monitor.is_running()
    }

    pub fn roots(&self) -> &R {
        &self.shared.roots
    }

    pub fn get_config(&self) -> GcConfig {
        self.config
    }

    pub fn metrics(&self) -> GcMetrics {
        self.shared.metrics.snapshot()
    }
}

impl<R: RootSource + 'static> Drop for Gc<R> {
    fn drop(&mut self) {
        if let Err(err) = self.stop_monitor() {
            error!("failed to stop the collector monitor: {err}");
        }

        self.wait_for_collection();

        debug!("dropping collector with {} tracked blocks", self.len());
    }
}
