//! Where a collection cycle looks for its first references.
//!
//! A [`RootSource`] hands each cycle a [`RootWindow`]: a stack range whose
//! words are all candidate addresses, plus values it reads directly, such as
//! a register snapshot or a run of explicit root slots.

mod registers;
mod slots;
mod stack;

pub use registers::register_snapshot;
pub use slots::RootSlots;
pub use stack::ThreadStack;

use std::mem::size_of;
use std::ops::Range;

pub const WORD: usize = size_of::<usize>();

/// The platform primitive the collector reads its roots from.
pub trait RootSource: Send + Sync {
    /// The roots of one cycle, or `None` if none can be taken from the
    /// calling context. A cycle without roots is skipped rather than run
    /// against an empty root set.
    fn capture(&self, with_registers: bool) -> Option<RootWindow>;

    /// True if another thread can only capture this source while its owner
    /// is parked. Periodic cycles for such a source wait for the owner's
    /// next call into the collector.
    fn needs_handshake(&self) -> bool {
        false
    }

    /// True if the calling thread can publish a window through [`park`].
    ///
    /// [`park`]: RootSource::park
    fn can_park(&self) -> bool {
        false
    }

    /// Publishes the caller's window for a cycle run on another thread. The
    /// window stays valid until [`unpark`], so the caller must not return
    /// past the frame it parked in before then.
    ///
    /// [`unpark`]: RootSource::unpark
    fn park(&self) {}

    /// Withdraws the window published by [`park`].
    ///
    /// [`park`]: RootSource::park
    fn unpark(&self) {}
}

/// The roots of a single collection cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootWindow {
    pub stack: Range<usize>,
    /// Candidate addresses read by value rather than scanned from memory.
    pub values: Vec<usize>,
}

impl RootWindow {
    /// A window over `[sp, base)`, with `sp` rounded up to a word boundary.
    /// Returns `None` when that range is empty.
    pub fn from_stack(sp: usize, base: usize, values: Vec<usize>) -> Option<Self> {
        let start = align_up(sp)?;

        if start >= base {
            return None;
        }

        Some(Self {
            stack: start..base,
            values,
        })
    }

    pub fn from_values(values: Vec<usize>) -> Self {
        Self { stack: 0..0, values }
    }

    pub fn stack_words(&self) -> usize {
        (self.stack.end - self.stack.start) / WORD
    }
}

fn align_up(addr: usize) -> Option<usize> {
    addr.checked_add(WORD - 1).map(|a| a & !(WORD - 1))
}
