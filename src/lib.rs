//! A conservative mark and sweep garbage collector layered over the system
//! allocator.
//!
//! Every block handed out by a [`Gc`] is recorded in an allocation table.
//! A collection treats each word of the root window (the collecting thread's
//! stack, and a snapshot of its registers) as a potential reference: any
//! word equal to the start address of a tracked block keeps that block alive,
//! and the contents of live blocks are scanned the same way. Everything left
//! unmarked is freed.
//! ```rust
//! use sweepit::{Gc, GcConfig};
//!
//! let gc = Gc::new(GcConfig::default()).unwrap();
//!
//! let a = gc.allocate(16).unwrap();
//! let b = gc.allocate(32).unwrap();
//!
//! gc.release(a).unwrap();
//! gc.collect().unwrap();
//!
//! assert_eq!(gc.find(a), None);
//! ```
//!
//! Being conservative, the collector never frees a block that is still
//! referenced from the root window, but an integer that happens to equal a
//! block's address will keep that block alive. Only start addresses count;
//! a pointer into the middle of a block does not keep it alive.
//!
//! Collections either run on the calling thread ([`Gc::collect`] with the
//! default config), or on a background task that wakes every
//! [`GcConfig::interval`] seconds ([`Gc::start_monitor`]). Either way the
//! cycle holds the same lock that serializes allocation calls.
//!
//! For code that expects the C allocation functions, [`global`] provides a
//! process wide collector behind `alloc`/`calloc`/`realloc`/`free`.
mod block;
mod collector;
mod config;
mod error;
mod gc;
mod heap;
mod math;
mod metrics;
mod monitor;
mod roots;
mod sync;
mod table;
mod trace;

pub mod global;

pub use block::Block;
pub use collector::CycleStats;
pub use config::{GcConfig, MIN_COLLECT_INTERVAL};
pub use error::{AllocError, ConfigError, GcError};
pub use gc::Gc;
pub use metrics::{GcMetrics, GcState};
pub use roots::{RootSlots, RootSource, RootWindow, ThreadStack};
pub use table::{AllocationTable, Entry, SweepStats};

#[cfg(test)]
mod test;
