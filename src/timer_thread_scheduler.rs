//! The sampling pass driver.
//!
//! One dedicated sampler thread runs alongside the profiled program and is
//! the only active participant in the pipeline. Per tick it drains the
//! scheduler-hook feed, sweeps the live threads and the suspended tasks
//! through the reader, unwinder and resolver, and hands the buffered
//! samples to the emitter. Between ticks it only sleeps.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::backtrace::Unwinder;
use crate::error::SessionError;
use crate::profile::{Profile, SessionSummary};
use crate::ringbuffer::RingbufferError;
use crate::sample::Sample;
use crate::serialization::emitter::SampleEmitter;
use crate::session::configuration::Configuration;
use crate::snapshot::{Snapshot, SnapshotReader};
use crate::task_forest::{ActiveTask, TaskForest};
use crate::vm::{RuntimeIntrospection, TaskEvent, ThreadId, ThreadInfo};

pub type OutputStream = Box<dyn Write + Send>;

pub struct TimerThreadScheduler {
    configuration: Arc<Configuration>,
    runtime: Arc<dyn RuntimeIntrospection>,
    task_events: Option<Receiver<TaskEvent>>,
    emitter: Option<SampleEmitter<OutputStream>>,
    stop_requested: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<SessionSummary, SessionError>>>,
}

impl TimerThreadScheduler {
    pub fn new(
        configuration: &Configuration,
        runtime: Arc<dyn RuntimeIntrospection>,
        task_events: Receiver<TaskEvent>,
        output: OutputStream,
    ) -> Self {
        Self {
            configuration: Arc::new(configuration.clone()),
            runtime,
            task_events: Some(task_events),
            emitter: Some(SampleEmitter::new(output)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.handle.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        let task_events = self.task_events.take().ok_or(SessionError::AlreadyStarted)?;
        let emitter = self.emitter.take().ok_or(SessionError::AlreadyStarted)?;

        let configuration = Arc::clone(&self.configuration);
        let runtime = Arc::clone(&self.runtime);
        let stop_requested = Arc::clone(&self.stop_requested);
        let handle = thread::Builder::new()
            .name("taskprof-sampler".to_owned())
            .spawn(move || {
                Self::thread_main_loop(configuration, runtime, task_events, stop_requested, emitter)
            })
            .map_err(SessionError::Spawn)?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the sampler and wait for the final flush.
    pub fn stop(&mut self) -> Result<SessionSummary, SessionError> {
        let handle = self.handle.take().ok_or(SessionError::NotRunning)?;
        self.stop_requested.store(true, Ordering::Relaxed);
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(SessionError::SamplerPanicked),
        }
    }

    fn thread_main_loop(
        configuration: Arc<Configuration>,
        runtime: Arc<dyn RuntimeIntrospection>,
        task_events: Receiver<TaskEvent>,
        stop_requested: Arc<AtomicBool>,
        mut emitter: SampleEmitter<OutputStream>,
    ) -> Result<SessionSummary, SessionError> {
        let mut profile = Profile::new(configuration.sample_buffer_capacity);
        let mut forest = TaskForest::new();
        let mut known_threads: HashMap<ThreadId, ThreadInfo> = HashMap::new();
        let reader = SnapshotReader::new(
            &*runtime,
            configuration.max_read_retries,
            configuration.max_unwind_depth,
        );
        let unwinder = Unwinder::new(
            &*runtime,
            configuration.max_unwind_depth,
            configuration.include_native_frames,
        );

        let mut tick: u32 = 0;
        while !stop_requested.load(Ordering::Relaxed) {
            Self::collect_tick(
                &*runtime,
                &reader,
                &unwinder,
                &mut forest,
                &mut known_threads,
                &task_events,
                &mut profile,
            );
            Self::drain_to_emitter(&mut profile, &mut emitter)?;

            // Absolute schedule: tick N fires at start + N·interval, so a
            // slow pass delays at most itself and the rate recovers.
            tick += 1;
            let next = profile.start_instant + configuration.interval * tick;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            }
        }

        Self::drain_to_emitter(&mut profile, &mut emitter)?;
        profile.end_instant = Some(Instant::now());
        profile.stats.emitted = emitter.emitted();
        let summary = SessionSummary {
            duration: profile.duration(),
            stats: profile.stats,
        };
        emitter.finish(&summary)?;
        log::debug!("session finished after {tick} ticks: {:?}", summary.stats);
        Ok(summary)
    }

    /// One sampling pass across all live threads and suspended tasks.
    /// Runs to completion without yielding; every failure mode is local.
    fn collect_tick(
        runtime: &dyn RuntimeIntrospection,
        reader: &SnapshotReader<'_>,
        unwinder: &Unwinder<'_>,
        forest: &mut TaskForest,
        known_threads: &mut HashMap<ThreadId, ThreadInfo>,
        task_events: &Receiver<TaskEvent>,
        profile: &mut Profile,
    ) {
        // Lineage first, so tasks spawned since the last tick are known
        // before their stacks show up.
        for event in task_events.try_iter() {
            forest.apply(event);
        }

        let live = runtime.threads();
        Self::update_thread_registry(known_threads, &live);

        for thread in live {
            match reader.read_running(thread.id) {
                None => {
                    // Gone between enumeration and capture.
                    profile.stats.vanished_threads += 1;
                }
                Some(Snapshot::Idle) => {}
                Some(Snapshot::Stale) => {
                    profile.stats.dropped_stale += 1;
                }
                Some(Snapshot::Chain(chain)) => {
                    let frames = unwinder.unwind(&chain);
                    let mut sample = Sample::new(thread.id, profile.elapsed_ns(), frames);
                    match forest.resolve(thread.id) {
                        ActiveTask::Running(task) => sample.task_id = Some(task),
                        ActiveTask::Unregistered => {
                            profile.stats.unresolved_tasks += 1;
                            sample.unresolved_task = true;
                        }
                        ActiveTask::None => {}
                    }
                    Self::buffer(profile, sample);
                }
            }
        }

        // Parked coroutines are invisible to the thread sweep; sample
        // their stored chains so time spent suspended is attributed.
        for (task, head, last_thread) in forest.suspended() {
            let thread_id = match last_thread {
                Some(thread_id) => thread_id,
                None => {
                    log::debug!("task {task} parked without ever running, skipping");
                    continue;
                }
            };
            match reader.read_parked(head) {
                Snapshot::Stale => profile.stats.dropped_stale += 1,
                Snapshot::Idle => {}
                Snapshot::Chain(chain) => {
                    let frames = unwinder.unwind(&chain);
                    let mut sample = Sample::new(thread_id, profile.elapsed_ns(), frames);
                    sample.task_id = Some(task);
                    Self::buffer(profile, sample);
                }
            }
        }
    }

    /// Ephemeral registry entries: created on discovery, removed when the
    /// thread terminates.
    fn update_thread_registry(
        known_threads: &mut HashMap<ThreadId, ThreadInfo>,
        live: &[ThreadInfo],
    ) {
        for thread in live {
            if !known_threads.contains_key(&thread.id) {
                log::trace!("discovered thread {} ({})", thread.id, thread.name);
                known_threads.insert(thread.id, thread.clone());
            }
        }
        known_threads.retain(|id, thread| {
            let alive = live.iter().any(|t| t.id == *id);
            if !alive {
                log::trace!("thread {} ({}) terminated", thread.id, thread.name);
            }
            alive
        });
    }

    fn buffer(profile: &mut Profile, sample: Sample) {
        match profile.temporary_sample_buffer.push(sample) {
            Ok(()) => profile.stats.captured += 1,
            Err(RingbufferError::Full) => {
                profile.stats.dropped_buffer_full += 1;
                log::debug!("temporary sample buffer full, dropping sample");
            }
        }
    }

    fn drain_to_emitter(
        profile: &mut Profile,
        emitter: &mut SampleEmitter<OutputStream>,
    ) -> Result<(), SessionError> {
        while let Some(sample) = profile.temporary_sample_buffer.pop() {
            emitter.emit(&sample)?;
        }
        Ok(())
    }
}
