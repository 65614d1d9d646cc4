// The only synchronization the collector relies on: one exclusive lock
// around the heap, and the ability to start a background task.

use super::error::GcError;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// The process wide guard serializing allocation calls and collections.
/// It is not re-entrant.
pub struct GcLock<T> {
    inner: Mutex<T>,
}

impl<T> GcLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Blocks until the guard is free. The guard is released when the
    /// returned value is dropped.
    pub fn acquire(&self) -> Result<MutexGuard<'_, T>, GcError> {
        self.inner
            .lock()
            .map_err(|_| GcError::Concurrency("collector lock poisoned"))
    }
}

pub fn spawn_background<F>(name: &str, f: F) -> Result<JoinHandle<()>, GcError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|_| GcError::Concurrency("failed to spawn the collector thread"))
}
