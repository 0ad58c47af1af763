//! Optimistic, bounded-retry reads of live frame chains.
//!
//! The runtime mutates frame chains constantly while we copy them. Instead
//! of locking (which would perturb the target), each attempt copies the
//! chain and accepts it only if the guarding generation marker was even
//! and unchanged around the copy. After `max_read_retries` extra attempts
//! the sample is given up as [`Snapshot::Stale`]; the caller counts the
//! drop and moves on.

use crate::vm::{FrameId, RawFrame, RuntimeIntrospection, ThreadId};

/// A detached copy of one frame chain. Self-contained: the `previous`
/// links of the copied records resolve against this copy, never against
/// live memory.
#[derive(Clone, Debug)]
pub struct RawChain {
    head: FrameId,
    records: Vec<(FrameId, RawFrame)>,
}

impl RawChain {
    pub fn head(&self) -> FrameId {
        self.head
    }

    pub fn record(&self, id: FrameId) -> Option<&RawFrame> {
        self.records
            .iter()
            .find(|(record_id, _)| *record_id == id)
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Clone, Debug)]
pub enum Snapshot {
    Chain(RawChain),
    /// The thread is alive but has no active frame.
    Idle,
    /// Every attempt raced with the runtime; the sample is dropped.
    Stale,
}

pub struct SnapshotReader<'a> {
    runtime: &'a dyn RuntimeIntrospection,
    max_retries: u32,
    /// Hard cap on copied records per chain, one above the unwind depth so
    /// the unwinder can still tell "ended" from "truncated".
    copy_limit: usize,
}

impl<'a> SnapshotReader<'a> {
    pub fn new(
        runtime: &'a dyn RuntimeIntrospection,
        max_retries: u32,
        max_unwind_depth: usize,
    ) -> Self {
        Self {
            runtime,
            max_retries,
            copy_limit: max_unwind_depth + 1,
        }
    }

    /// Snapshot the running chain of a thread.
    /// `None` means the thread vanished between enumeration and capture.
    pub fn read_running(&self, thread: ThreadId) -> Option<Snapshot> {
        for _ in 0..=self.max_retries {
            let before = self.runtime.chain_generation(thread)?;
            if before & 1 == 1 {
                // Mutation in flight; this attempt cannot be consistent.
                continue;
            }
            let head = match self.runtime.chain_head(thread)? {
                Some(head) => head,
                None => return Some(Snapshot::Idle),
            };
            let chain = match self.copy_chain(head) {
                Some(chain) => chain,
                None => continue,
            };
            let after = self.runtime.chain_generation(thread)?;
            if before == after {
                return Some(Snapshot::Chain(chain));
            }
        }
        log::trace!("dropping torn read of thread {thread}");
        Some(Snapshot::Stale)
    }

    /// Snapshot the parked chain of a suspended task. Parked chains are
    /// not guarded by any thread's marker, so consistency is checked
    /// against the arena-wide recycle generation instead.
    pub fn read_parked(&self, head: FrameId) -> Snapshot {
        for _ in 0..=self.max_retries {
            let before = self.runtime.arena_generation();
            if before & 1 == 1 {
                continue;
            }
            let chain = match self.copy_chain(head) {
                Some(chain) => chain,
                None => continue,
            };
            let after = self.runtime.arena_generation();
            if before == after {
                return Snapshot::Chain(chain);
            }
        }
        log::trace!("dropping torn read of parked chain at {head}");
        Snapshot::Stale
    }

    /// Walk `previous` links from `head`, copying records by value.
    /// `None` if a link points at an unreadable slot (recycled under us).
    /// The walk is capped at `copy_limit` records so a corrupted or cyclic
    /// chain cannot spin the reader.
    fn copy_chain(&self, head: FrameId) -> Option<RawChain> {
        let mut records = Vec::new();
        let mut next = Some(head);
        while let Some(id) = next {
            if records.len() == self.copy_limit {
                break;
            }
            // A revisited id means the linkage is cyclic; keep what we
            // have and let the unwinder's depth bound deal with it.
            if records.iter().any(|(record_id, _)| *record_id == id) {
                break;
            }
            let record = self.runtime.frame(id)?;
            next = record.previous;
            records.push((id, record));
        }
        Some(RawChain { head, records })
    }
}
