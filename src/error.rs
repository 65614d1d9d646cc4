use log::error;
use std::fmt;

/// Failure reported by the underlying system allocator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    BadRequest,
    OOM,
}

/// Why a configuration was rejected.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConfigError {
    AlreadyInitialized,
    NotInitialized,
    /// Automatic collection was requested with an interval under the minimum.
    IntervalTooShort(u64),
    CapacityTooSmall(usize),
    LoadFactor(f64),
}

/// Every error the collector can report.
///
/// Configuration, table invariant and concurrency errors leave the
/// bookkeeping out of step with the real heap, see [`GcError::is_fatal`].
#[derive(Clone, Debug, PartialEq)]
pub enum GcError {
    Configuration(ConfigError),
    /// An insert found no free slot even though the load factor was honoured.
    TableInvariant(usize),
    /// The address is not a live tracked block.
    UntrackedPointer(usize),
    Alloc(AllocError),
    Concurrency(&'static str),
}

impl GcError {
    /// Errors after which the process must not keep using the collector.
    ///
    /// Releasing or reallocating an untracked pointer counts as fatal, the
    /// same as a double free would be.
    pub fn is_fatal(&self) -> bool {
        match self {
            GcError::Configuration(_)
            | GcError::TableInvariant(_)
            | GcError::UntrackedPointer(_)
            | GcError::Concurrency(_) => true,
            GcError::Alloc(AllocError::OOM) => true,
            GcError::Alloc(AllocError::BadRequest) => false,
        }
    }
}

/// Logs the error and aborts. Used where a fatal error can't be handed
/// back to the caller.
pub(crate) fn fatal(err: &GcError) -> ! {
    error!("fatal collector error: {err}");

    std::process::abort()
}

impl From<AllocError> for GcError {
    fn from(error: AllocError) -> GcError {
        GcError::Alloc(error)
    }
}

impl From<ConfigError> for GcError {
    fn from(error: ConfigError) -> GcError {
        GcError::Configuration(error)
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::BadRequest => write!(f, "invalid allocation request"),
            AllocError::OOM => write!(f, "out of memory"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::AlreadyInitialized => {
                write!(f, "the collector can't be initialized twice")
            }
            ConfigError::NotInitialized => write!(f, "the collector has not been initialized"),
            ConfigError::IntervalTooShort(secs) => write!(
                f,
                "invalid interval {secs}s: must be 0 or at least {}s",
                crate::config::MIN_COLLECT_INTERVAL
            ),
            ConfigError::CapacityTooSmall(cap) => {
                write!(f, "initial capacity {cap} leaves no prime to probe with")
            }
            ConfigError::LoadFactor(lf) => {
                write!(f, "max load factor {lf} must lie strictly between 0 and 1")
            }
        }
    }
}

impl fmt::Display for GcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcError::Configuration(e) => write!(f, "configuration error: {e}"),
            GcError::TableInvariant(addr) => write!(
                f,
                "allocation table has no free slot for {addr:#x} despite its load factor"
            ),
            GcError::UntrackedPointer(addr) => {
                write!(f, "{addr:#x} is not a block tracked by the collector")
            }
            GcError::Alloc(e) => write!(f, "allocation failed: {e}"),
            GcError::Concurrency(what) => write!(f, "concurrency primitive failure: {what}"),
        }
    }
}

impl std::error::Error for AllocError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for GcError {}
