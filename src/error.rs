use thiserror::Error;

/// Fatal, session-level failures.
///
/// Per-sample conditions (torn reads, vanished threads, unresolved tasks,
/// buffer overflow) are deliberately not represented here: they are counted
/// in [`SessionStats`](crate::profile::SessionStats) and profiling
/// continues.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The runtime does not expose the introspection or scheduler hooks
    /// the profiler needs. Surfaced at session construction.
    #[error("runtime introspection unavailable: {0}")]
    Unavailable(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    #[error("session already started")]
    AlreadyStarted,

    #[error("session is not running")]
    NotRunning,

    #[error("sampler thread panicked")]
    SamplerPanicked,

    #[error("failed to spawn sampler thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The output stream failed while emitting or flushing samples.
    #[error("failed to emit samples: {0}")]
    Emit(#[from] std::io::Error),
}
