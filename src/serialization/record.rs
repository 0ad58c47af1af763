//! Wire records, kept separate from the in-memory sample types so the
//! stream format can evolve without touching the capture pipeline.

use crate::profile::SessionSummary;
use crate::sample::{Frame, FrameKind, Sample};

/// One line of the output stream, externally tagged by record kind.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Record {
    Sample(SampleRecord),
    /// Trailing metadata line written once at the end of the stream.
    Summary(SummaryRecord),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SampleRecord {
    pub thread_id: u64,
    pub timestamp_ns: u128,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub task_id: Option<u64>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub unresolved_task: bool,
    pub frames: Vec<FrameRecord>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FrameRecord {
    pub name: String,
    pub filename: String,
    pub lineno: u32,
    pub kind: FrameKindRecord,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameKindRecord {
    Interpreted,
    Native,
    SuspendedCoroutine,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SummaryRecord {
    pub duration_ns: u128,
    pub captured: u64,
    pub emitted: u64,
    pub dropped_stale: u64,
    pub vanished_threads: u64,
    pub unresolved_tasks: u64,
    pub dropped_buffer_full: u64,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl From<&Sample> for SampleRecord {
    fn from(sample: &Sample) -> Self {
        Self {
            thread_id: sample.thread_id,
            timestamp_ns: sample.timestamp_ns,
            task_id: sample.task_id,
            unresolved_task: sample.unresolved_task,
            frames: sample.frames.iter().map(FrameRecord::from).collect(),
        }
    }
}

impl From<&Frame> for FrameRecord {
    fn from(frame: &Frame) -> Self {
        Self {
            name: frame.name.clone(),
            filename: frame.filename.clone(),
            lineno: frame.lineno,
            kind: match frame.kind {
                FrameKind::Interpreted => FrameKindRecord::Interpreted,
                FrameKind::Native => FrameKindRecord::Native,
                FrameKind::SuspendedCoroutine => FrameKindRecord::SuspendedCoroutine,
            },
        }
    }
}

impl From<&SessionSummary> for SummaryRecord {
    fn from(summary: &SessionSummary) -> Self {
        Self {
            duration_ns: summary.duration.as_nanos(),
            captured: summary.stats.captured,
            emitted: summary.stats.emitted,
            dropped_stale: summary.stats.dropped_stale,
            vanished_threads: summary.stats.vanished_threads,
            unresolved_tasks: summary.stats.unresolved_tasks,
            dropped_buffer_full: summary.stats.dropped_buffer_full,
        }
    }
}
