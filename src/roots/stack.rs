use super::{register_snapshot, RootSource, RootWindow, WORD};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

// Slack added above the captured base so the rest of the frame that created
// the source, and whatever its caller keeps right above it, is scanned too.
const STACK_BASE_SLACK: usize = 128 * WORD;

// Enough for every callee saved register on the supported targets.
const MAX_PARKED_REGISTERS: usize = 16;

/// Returns an address inside the caller's stack frame.
#[inline(never)]
fn current_stack_pointer() -> usize {
    let marker = 0usize;

    black_box(&marker) as *const usize as usize
}

/// The call stack of the thread that created the collector.
///
/// The base is captured once, when the source is built, so references held
/// in frames entered after that point are always visible. Frames that were
/// already live when the source was built are only covered as far as the
/// slack above the base reaches; embedders that know the real top of their
/// stack can pass it to [`ThreadStack::with_base`].
///
/// Another thread (the background collector) can't read this thread's stack
/// pointer or registers. It can only capture the window the owner publishes
/// with [`RootSource::park`], and only until the owner unparks.
pub struct ThreadStack {
    base: usize,
    owner: ThreadId,
    parked: AtomicUsize,
    parked_registers: [AtomicUsize; MAX_PARKED_REGISTERS],
    parked_register_count: AtomicUsize,
}

impl ThreadStack {
    #[inline(always)]
    pub fn new() -> Self {
        let marker = 0usize;
        let here = black_box(&marker) as *const usize as usize;

        Self::with_base(here.saturating_add(STACK_BASE_SLACK))
    }

    pub fn with_base(base: usize) -> Self {
        Self {
            base,
            owner: thread::current().id(),
            parked: AtomicUsize::new(0),
            parked_registers: std::array::from_fn(|_| AtomicUsize::new(0)),
            parked_register_count: AtomicUsize::new(0),
        }
    }

    /// The lowest live address of the owner's stack: the current one on the
    /// owning thread, the parked one anywhere else.
    pub fn stack_pointer(&self) -> Option<usize> {
        if self.is_owner() {
            return Some(current_stack_pointer());
        }

        match self.parked.load(Ordering::Acquire) {
            0 => None,
            sp => Some(sp),
        }
    }

    pub fn stack_base(&self) -> usize {
        self.base
    }

    /// Live registers on the owning thread. Elsewhere, the registers saved
    /// by the last park, or nothing if the owner isn't parked.
    pub fn register_snapshot(&self) -> Vec<usize> {
        if self.is_owner() {
            return register_snapshot();
        }

        if !self.is_parked() {
            return Vec::new();
        }

        let count = self.parked_register_count.load(Ordering::Relaxed);

        self.parked_registers[..count]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }

    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Acquire) != 0
    }

    fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl Default for ThreadStack {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl RootSource for ThreadStack {
    fn capture(&self, with_registers: bool) -> Option<RootWindow> {
        // registers first, so nothing between the two reads can move a
        // reference out of a register unobserved
        let values = if with_registers {
            self.register_snapshot()
        } else {
            Vec::new()
        };
        let sp = self.stack_pointer()?;

        RootWindow::from_stack(sp, self.base, values)
    }

    fn needs_handshake(&self) -> bool {
        true
    }

    fn can_park(&self) -> bool {
        self.is_owner()
    }

    // Inlined so the registers and stack pointer are those of the frame
    // that parks, which stays live until it unparks.
    #[inline(always)]
    fn park(&self) {
        if !self.is_owner() {
            return;
        }

        let registers = register_snapshot();
        let count = registers.len().min(MAX_PARKED_REGISTERS);

        for (slot, value) in self.parked_registers.iter().zip(registers) {
            slot.store(value, Ordering::Relaxed);
        }

        self.parked_register_count.store(count, Ordering::Relaxed);
        self.parked.store(current_stack_pointer(), Ordering::Release);
    }

    fn unpark(&self) {
        if self.is_owner() {
            self.parked.store(0, Ordering::Release);
        }
    }
}
