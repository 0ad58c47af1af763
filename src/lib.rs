//! In-process sampling profiler for a managed runtime, with
//! cooperative-task (coroutine) attribution.
//!
//! A dedicated sampler thread periodically snapshots the frame chains of
//! all live runtime threads (and of suspended coroutines) without ever
//! locking against or writing to the target, overlays task lineage from
//! the runtime's scheduler hooks, and streams the resulting stack samples
//! to an output stream as they are captured.

extern crate serde;
#[macro_use]
extern crate serde_derive;

mod backtrace;
mod error;
mod profile;
mod ringbuffer;
mod sample;
mod serialization;
mod session;
mod snapshot;
mod task_forest;
mod timer_thread_scheduler;
mod vm;

pub use crate::backtrace::{Unwinder, NATIVE_MARKER};
pub use crate::error::SessionError;
pub use crate::profile::{SessionStats, SessionSummary};
pub use crate::sample::{Frame, FrameKind, Sample};
pub use crate::serialization::emitter::SampleEmitter;
pub use crate::serialization::record::{FrameKindRecord, FrameRecord, Record, SampleRecord, SummaryRecord};
pub use crate::session::configuration::Configuration;
pub use crate::session::Session;
pub use crate::snapshot::{RawChain, Snapshot, SnapshotReader};
pub use crate::task_forest::{ActiveTask, Task, TaskForest};
pub use crate::vm::{
    task_event_channel, FrameId, FunctionInfo, RawFrame, RawFrameKind, RuntimeIntrospection,
    SpawnKind, SymbolId, TaskEvent, TaskId, ThreadId, ThreadInfo,
};
