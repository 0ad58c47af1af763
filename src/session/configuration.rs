use std::time::Duration;

use crate::error::SessionError;

/// Non-round default so the sampler does not phase-lock with common 10 ms
/// runtime timers.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(9);
/// One initial attempt plus this many retries per torn read.
pub const DEFAULT_MAX_READ_RETRIES: u32 = 3;
pub const DEFAULT_MAX_UNWIND_DEPTH: usize = 128;
pub const DEFAULT_SAMPLE_BUFFER_CAPACITY: usize = 10_000;

#[derive(Clone, Debug)]
pub struct Configuration {
    /// Sampling tick interval.
    pub interval: Duration,
    /// Report native frames individually instead of collapsing stretches
    /// of them into a single marker.
    pub include_native_frames: bool,
    /// Retry bound for inconsistent (torn) frame-chain reads.
    pub max_read_retries: u32,
    /// Frames to unwind per stack before truncating.
    pub max_unwind_depth: usize,
    /// Capacity of the capture buffer between sampling and emission.
    pub sample_buffer_capacity: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            include_native_frames: false,
            max_read_retries: DEFAULT_MAX_READ_RETRIES,
            max_unwind_depth: DEFAULT_MAX_UNWIND_DEPTH,
            sample_buffer_capacity: DEFAULT_SAMPLE_BUFFER_CAPACITY,
        }
    }
}

impl Configuration {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.interval.is_zero() {
            return Err(SessionError::InvalidConfiguration(
                "interval must be non-zero",
            ));
        }
        if self.max_unwind_depth == 0 {
            return Err(SessionError::InvalidConfiguration(
                "max_unwind_depth must be non-zero",
            ));
        }
        if self.sample_buffer_capacity == 0 {
            return Err(SessionError::InvalidConfiguration(
                "sample_buffer_capacity must be non-zero",
            ));
        }
        Ok(())
    }
}
