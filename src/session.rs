pub mod configuration;

use std::io::Write;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use self::configuration::Configuration;
use crate::error::SessionError;
use crate::profile::SessionSummary;
use crate::timer_thread_scheduler::TimerThreadScheduler;
use crate::vm::{RuntimeIntrospection, TaskEvent};

/// One profiling run against one runtime.
///
/// The session owns every registry the pipeline uses (task forest, thread
/// bookkeeping, capture buffer); they are created at `start` inside the
/// sampler thread and torn down at `stop`. Nothing survives the session
/// but the output stream.
pub struct Session {
    pub configuration: Configuration,
    scheduler: TimerThreadScheduler,
}

impl Session {
    /// Validate the configuration and probe the runtime's capabilities.
    /// Fails fast: a runtime without the required hooks can never produce
    /// a single sample, so the session refuses to exist.
    pub fn new(
        configuration: Configuration,
        runtime: Arc<dyn RuntimeIntrospection>,
        task_events: Receiver<TaskEvent>,
        output: Box<dyn Write + Send>,
    ) -> Result<Self, SessionError> {
        configuration.validate()?;
        if !runtime.hooks_installed() {
            return Err(SessionError::Unavailable(
                "frame-chain and scheduler hooks are not installed",
            ));
        }

        let scheduler = TimerThreadScheduler::new(&configuration, runtime, task_events, output);
        Ok(Session {
            configuration,
            scheduler,
        })
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        self.scheduler.start()
    }

    /// Stop sampling. Joins the sampler thread, which flushes every
    /// captured-but-unemitted sample and closes the stream with a summary
    /// record before returning.
    pub fn stop(&mut self) -> Result<SessionSummary, SessionError> {
        self.scheduler.stop()
    }
}
