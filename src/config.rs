use super::error::{ConfigError, GcError};

/// This structure contains the configuration settings for a collector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GcConfig {
    /// Seconds between automatic collections. Zero disables the background
    /// collector so that collections only happen when explicitly requested.
    /// Any other value must be at least [`MIN_COLLECT_INTERVAL`].
    pub interval: u64,

    /// The number of slots the allocation table starts with. The value is
    /// rounded down to a prime since the capacity is also the modulus used
    /// by the probe sequence.
    pub initial_capacity: usize,

    /// Once the number of tracked blocks divided by the table capacity would
    /// surpass this value, the table doubles in size.
    pub max_load_factor: f64,

    /// Extend the root window with a snapshot of the callee saved registers
    /// on platforms where one can be taken.
    pub scan_registers: bool,
}

pub const MIN_COLLECT_INTERVAL: u64 = 30;

pub const GC_CONFIG_DEFAULT_INTERVAL: u64 = 0;
pub const GC_CONFIG_DEFAULT_INITIAL_CAPACITY: usize = 257;
pub const GC_CONFIG_DEFAULT_MAX_LOAD_FACTOR: f64 = 0.74;
pub const GC_CONFIG_DEFAULT_SCAN_REGISTERS: bool = true;

impl Default for GcConfig {
    /// Creates a manual-only config. Good for most use cases.
    fn default() -> Self {
        GcConfig {
            interval: GC_CONFIG_DEFAULT_INTERVAL,
            initial_capacity: GC_CONFIG_DEFAULT_INITIAL_CAPACITY,
            max_load_factor: GC_CONFIG_DEFAULT_MAX_LOAD_FACTOR,
            scan_registers: GC_CONFIG_DEFAULT_SCAN_REGISTERS,
        }
    }
}

impl GcConfig {
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval = secs;
        self
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_max_load_factor(mut self, load_factor: f64) -> Self {
        self.max_load_factor = load_factor;
        self
    }

    pub fn with_register_scan(mut self, on: bool) -> Self {
        self.scan_registers = on;
        self
    }

    /// True when a background task should collect on a timer.
    pub fn is_automatic(&self) -> bool {
        self.interval != 0
    }

    pub fn validate(&self) -> Result<(), GcError> {
        if self.interval != 0 && self.interval < MIN_COLLECT_INTERVAL {
            return Err(ConfigError::IntervalTooShort(self.interval).into());
        }

        if self.initial_capacity < 3 {
            return Err(ConfigError::CapacityTooSmall(self.initial_capacity).into());
        }

        if !(self.max_load_factor > 0.0 && self.max_load_factor < 1.0) {
            return Err(ConfigError::LoadFactor(self.max_load_factor).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_and_manual() {
        let config = GcConfig::default();

        assert!(config.validate().is_ok());
        assert!(!config.is_automatic());
    }

    #[test]
    fn interval_bounds() {
        for secs in 1..MIN_COLLECT_INTERVAL {
            let err = GcConfig::default().with_interval(secs).validate();

            assert_eq!(
                err,
                Err(GcError::Configuration(ConfigError::IntervalTooShort(secs)))
            );
        }

        assert!(GcConfig::default().with_interval(0).validate().is_ok());
        assert!(GcConfig::default().with_interval(30).validate().is_ok());
        assert!(GcConfig::default().with_interval(60).validate().is_ok());
    }

    #[test]
    fn rejects_bad_table_settings() {
        assert!(GcConfig::default().with_initial_capacity(2).validate().is_err());
        assert!(GcConfig::default().with_max_load_factor(1.0).validate().is_err());
        assert!(GcConfig::default().with_max_load_factor(0.0).validate().is_err());
        assert!(GcConfig::default().with_max_load_factor(f64::NAN).validate().is_err());
    }
}
