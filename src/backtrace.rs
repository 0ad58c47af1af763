//! Conversion of detached raw chains into resolved frame sequences.

use crate::sample::{Frame, FrameKind};
use crate::snapshot::RawChain;
use crate::vm::{RawFrame, RawFrameKind, RuntimeIntrospection};

/// Placeholder name for stretches of native code when native-frame
/// reporting is disabled.
pub const NATIVE_MARKER: &str = "<native>";

pub struct Unwinder<'a> {
    runtime: &'a dyn RuntimeIntrospection,
    max_depth: usize,
    include_native_frames: bool,
}

impl<'a> Unwinder<'a> {
    pub fn new(
        runtime: &'a dyn RuntimeIntrospection,
        max_depth: usize,
        include_native_frames: bool,
    ) -> Self {
        Self {
            runtime,
            max_depth,
            include_native_frames,
        }
    }

    /// Walk a detached chain from its head (innermost frame) towards the
    /// root, resolving each record into an owned [`Frame`].
    ///
    /// The walk stops at `max_depth` frames no matter what the copied
    /// linkage claims; the chain is untrusted memory and may be cyclic. A
    /// link that leaves the copy also ends the walk: the reader copied
    /// less than the linkage implies, and inventing frames is worse than
    /// stopping.
    pub fn unwind(&self, chain: &RawChain) -> Vec<Frame> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut next = if chain.is_empty() {
            None
        } else {
            Some(chain.head())
        };

        while let Some(id) = next {
            if frames.len() == self.max_depth {
                log::debug!("unwind depth limit reached, truncating stack");
                break;
            }
            let record = match chain.record(id) {
                Some(record) => record,
                None => break,
            };
            next = record.previous;

            match self.resolve(record) {
                Resolved::Frame(frame) => frames.push(frame),
                Resolved::NativeStretch => {
                    // Merge runs of unreportable native frames into one
                    // marker so they do not dominate the stack.
                    let merged = frames
                        .last()
                        .is_some_and(|last| last.name == NATIVE_MARKER);
                    if !merged {
                        frames.push(Frame {
                            name: NATIVE_MARKER.to_owned(),
                            filename: String::new(),
                            lineno: 0,
                            kind: FrameKind::Native,
                        });
                    }
                }
            }
        }
        frames
    }

    fn resolve(&self, record: &RawFrame) -> Resolved {
        let function = self.runtime.function(record.symbol);
        match (record.kind, function) {
            (RawFrameKind::Interpreted, Some(function)) => Resolved::Frame(Frame {
                name: function.name,
                filename: function.filename,
                lineno: record.lineno,
                kind: FrameKind::Interpreted,
            }),
            (RawFrameKind::SuspendedCoroutine, Some(function)) => Resolved::Frame(Frame {
                name: function.name,
                filename: function.filename,
                lineno: record.lineno,
                kind: FrameKind::SuspendedCoroutine,
            }),
            (RawFrameKind::Native, function) if self.include_native_frames => {
                let (name, filename) = match function {
                    Some(function) => (function.name, function.filename),
                    None => (
                        NATIVE_MARKER.to_owned(),
                        format!("native@{:#x}", record.symbol),
                    ),
                };
                Resolved::Frame(Frame {
                    name,
                    filename,
                    lineno: record.lineno,
                    kind: FrameKind::Native,
                })
            }
            // Native frames with reporting off, and records whose symbol
            // has no interpreted-level resolution.
            (_, None) if self.include_native_frames => Resolved::Frame(Frame {
                name: NATIVE_MARKER.to_owned(),
                filename: format!("native@{:#x}", record.symbol),
                lineno: 0,
                kind: FrameKind::Native,
            }),
            _ => Resolved::NativeStretch,
        }
    }
}

enum Resolved {
    Frame(Frame),
    /// Part of a native stretch to be collapsed into a single marker.
    NativeStretch,
}
