//! A process wide collector with the calling conventions of the C allocation
//! functions.
//!
//! Call [`init`] once, as close to the top of the main thread's stack as
//! possible, then use [`alloc`], [`calloc`], [`realloc`] and [`free`] in
//! place of their C counterparts. Running out of memory, or misuse that would
//! leave the bookkeeping out of step with the real heap (a double free, a
//! lost lock), is logged and aborts the process. A request whose size can't
//! even be expressed returns null.
//!
//! ```no_run
//! sweepit::global::init(0).unwrap();
//!
//! let ptr = sweepit::global::alloc(64);
//! sweepit::global::free(ptr);
//! ```

use super::config::GcConfig;
use super::error::{fatal, ConfigError, GcError};
use super::gc::Gc;
use std::ptr::null_mut;
use std::sync::OnceLock;

static GLOBAL: OnceLock<Gc> = OnceLock::new();

/// Initializes the global collector. An `interval` of zero means collections
/// only happen through [`collect`]; any other value starts the background
/// collector with that period in seconds, and must be at least
/// [`crate::config::MIN_COLLECT_INTERVAL`].
#[inline(always)]
pub fn init(interval: u64) -> Result<(), GcError> {
    init_with(GcConfig::default().with_interval(interval))
}

#[inline(always)]
pub fn init_with(config: GcConfig) -> Result<(), GcError> {
    if GLOBAL.get().is_some() {
        return Err(ConfigError::AlreadyInitialized.into());
    }

    let gc = Gc::new(config)?;

    GLOBAL
        .set(gc)
        .map_err(|_| ConfigError::AlreadyInitialized.into())
}

pub fn instance() -> Result<&'static Gc, GcError> {
    GLOBAL
        .get()
        .ok_or_else(|| ConfigError::NotInitialized.into())
}

fn global_or_abort() -> &'static Gc {
    match instance() {
        Ok(gc) => gc,
        Err(err) => fatal(&err),
    }
}

fn ptr_or_abort(result: Result<*mut u8, GcError>) -> *mut u8 {
    match result {
        Ok(ptr) => ptr,
        Err(err) if err.is_fatal() => fatal(&err),
        Err(_) => null_mut(),
    }
}

pub fn alloc(size: usize) -> *mut u8 {
    ptr_or_abort(global_or_abort().allocate(size))
}

pub fn calloc(count: usize, size: usize) -> *mut u8 {
    ptr_or_abort(global_or_abort().zero_allocate(count, size))
}

/// On an impossible size, returns null and leaves the old block tracked.
pub fn realloc(ptr: *mut u8, size: usize) -> *mut u8 {
    ptr_or_abort(global_or_abort().reallocate(ptr, size))
}

pub fn free(ptr: *mut u8) {
    if let Err(err) = global_or_abort().release(ptr) {
        fatal(&err);
    }
}

/// Collects now, or wakes the background collector if it is running.
pub fn collect() {
    if let Err(err) = global_or_abort().collect() {
        fatal(&err);
    }
}

pub fn find<T>(ptr: *const T) -> Option<usize> {
    instance().ok()?.find(ptr)
}
