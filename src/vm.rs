//! The seam between the profiler and the profiled runtime.
//!
//! Everything the sampler knows about the target VM comes through the
//! [`RuntimeIntrospection`] trait (frame chains, symbols, thread list) and
//! the [`TaskEvent`] feed (cooperative-scheduler hooks). The profiler never
//! writes through this seam.

use crossbeam_channel::{Receiver, Sender};

pub type ThreadId = u64;
pub type TaskId = u64;
pub type SymbolId = u64;

/// Index of a frame record in the runtime's frame arena.
///
/// Slots are recycled as calls return, so an id is only meaningful together
/// with a stable generation marker (see [`RuntimeIntrospection`]).
pub type FrameId = usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
    /// Raw OS-level thread id, as reported by the runtime.
    pub native_thread_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawFrameKind {
    /// A frame executing managed (interpreted) code.
    Interpreted,
    /// A frame the runtime could only describe as native code.
    Native,
    /// The resume point of a coroutine that is currently parked.
    SuspendedCoroutine,
}

/// One frame record, copied out of the runtime's frame arena by value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub symbol: SymbolId,
    pub lineno: u32,
    pub kind: RawFrameKind,
    /// Link towards the chain root (the caller), `None` at the entry frame.
    pub previous: Option<FrameId>,
}

/// Resolved metadata for an interpreted-level function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub filename: String,
}

/// Read-only, lock-free view into the live runtime.
///
/// All methods are called concurrently with the target program's own
/// execution. Implementations must never block the thread under inspection
/// and must tolerate reads of state that is being mutated; consistency is
/// the caller's problem and is handled with the generation markers:
///
/// * a per-thread marker guards that thread's running frame chain, and
/// * an arena-wide marker guards parked (suspended-coroutine) chains.
///
/// Both markers follow the same protocol: odd while a mutation is in
/// flight, changed whenever guarded state may have been rewritten.
pub trait RuntimeIntrospection: Send + Sync {
    /// Whether the runtime exposes the frame-chain and scheduler hooks the
    /// profiler needs. Checked once at session construction.
    fn hooks_installed(&self) -> bool;

    /// Enumerate the currently live threads. The set may change at any
    /// time; entries are re-fetched on every sampling pass.
    fn threads(&self) -> Vec<ThreadInfo>;

    /// Generation marker for a thread's running frame chain, or `None` if
    /// the thread is gone.
    fn chain_generation(&self, thread: ThreadId) -> Option<u64>;

    /// Topmost (innermost) frame of a thread's running chain. `None` means
    /// the thread is gone; `Some(None)` means it is alive but idle.
    fn chain_head(&self, thread: ThreadId) -> Option<Option<FrameId>>;

    /// Generation marker for the frame arena as a whole, bumped whenever
    /// frame slots are freed or recycled.
    fn arena_generation(&self) -> u64;

    /// Copy one raw frame record. `None` if the slot id is out of range.
    /// The copy itself may be torn; callers validate with the markers.
    fn frame(&self, id: FrameId) -> Option<RawFrame>;

    /// Resolve a symbol to interpreted-level function metadata. `None` for
    /// symbols the runtime only knows as native code.
    fn function(&self, symbol: SymbolId) -> Option<FunctionInfo>;
}

/// How a task came into being, recorded at spawn time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnKind {
    /// Spawned as the direct continuation of its parent.
    Continuation,
    /// Spawned alongside siblings in one fan-out operation.
    Gathered,
}

/// Cooperative-scheduler hook events.
///
/// Lineage must be captured here, at the moment it happens: once several
/// gathered children are running, their parentage is no longer recoverable
/// from stack shape alone.
#[derive(Clone, Debug)]
pub enum TaskEvent {
    Created {
        task: TaskId,
        parent: Option<TaskId>,
        name: String,
        spawn: SpawnKind,
    },
    /// The task started (or resumed) running on a thread.
    Scheduled { task: TaskId, thread: ThreadId },
    /// The task yielded, parking the chain it will resume from.
    Suspended {
        task: TaskId,
        resume_frame: Option<FrameId>,
    },
    Completed { task: TaskId },
}

/// Channel for delivering [`TaskEvent`]s from the runtime's scheduler hook
/// to a profiling session. Unbounded so the hook side never blocks.
pub fn task_event_channel() -> (Sender<TaskEvent>, Receiver<TaskEvent>) {
    crossbeam_channel::unbounded()
}
