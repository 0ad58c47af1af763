//! Cooperative-task lineage.
//!
//! One thread executes many tasks in turn, and the physical frame chain
//! only ever shows the task running *right now*. Ancestry and siblingship
//! are therefore recorded eagerly from scheduler-hook events at the moment
//! they happen, never reconstructed from stack shape: two children gathered
//! under one parent are indistinguishable from nested calls once they run.

use std::collections::HashMap;

use crate::vm::{FrameId, SpawnKind, TaskEvent, TaskId, ThreadId};

#[derive(Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Set once at creation, absent for roots. Survives the parent's own
    /// completion; lineage is never rewritten.
    pub parent: Option<TaskId>,
    pub spawn: SpawnKind,
    pub completed: bool,
    /// The thread this task last ran on; suspended-task samples are
    /// attributed to it.
    pub last_thread: Option<ThreadId>,
    /// Head of the frame chain the task parked with, while suspended.
    pub parked_chain: Option<FrameId>,
}

/// What `resolve` found active on a thread at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveTask {
    Running(TaskId),
    /// The runtime reported a task the forest never saw created
    /// (bookkeeping race). The sample is emitted thread-only and counted.
    Unregistered,
    /// No task is scheduled on the thread.
    None,
}

/// The forest of cooperative tasks, keyed by id, plus the thread-to-task
/// schedule. Owned by the session; mutated only from the sampler thread.
#[derive(Debug, Default)]
pub struct TaskForest {
    tasks: HashMap<TaskId, Task>,
    active: HashMap<ThreadId, TaskId>,
}

impl TaskForest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Created {
                task,
                parent,
                name,
                spawn,
            } => {
                if self.tasks.contains_key(&task) {
                    log::debug!("task {task} created twice, keeping first record");
                    return;
                }
                self.tasks.insert(
                    task,
                    Task {
                        id: task,
                        name,
                        parent,
                        spawn,
                        completed: false,
                        last_thread: None,
                        parked_chain: None,
                    },
                );
            }
            TaskEvent::Scheduled { task, thread } => {
                self.active.insert(thread, task);
                if let Some(entry) = self.tasks.get_mut(&task) {
                    entry.last_thread = Some(thread);
                    entry.parked_chain = None;
                }
            }
            TaskEvent::Suspended { task, resume_frame } => {
                self.active.retain(|_, active| *active != task);
                if let Some(entry) = self.tasks.get_mut(&task) {
                    entry.parked_chain = resume_frame;
                }
            }
            TaskEvent::Completed { task } => {
                self.active.retain(|_, active| *active != task);
                if let Some(entry) = self.tasks.get_mut(&task) {
                    entry.completed = true;
                    entry.parked_chain = None;
                }
            }
        }
    }

    /// The task active on a thread at capture time.
    pub fn resolve(&self, thread: ThreadId) -> ActiveTask {
        match self.active.get(&thread) {
            Some(task) if self.tasks.contains_key(task) => ActiveTask::Running(*task),
            Some(_) => ActiveTask::Unregistered,
            None => ActiveTask::None,
        }
    }

    pub fn get(&self, task: TaskId) -> Option<&Task> {
        self.tasks.get(&task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Parent-link walk from a task up to its root, excluding the task
    /// itself. The walk is bounded by the forest size: parent links are
    /// immutable and set at creation, so a longer walk can only mean
    /// corrupted bookkeeping.
    pub fn ancestry(&self, task: TaskId) -> Vec<TaskId> {
        let mut chain = Vec::new();
        let mut current = self.tasks.get(&task).and_then(|t| t.parent);
        while let Some(id) = current {
            if chain.len() == self.tasks.len() {
                log::debug!("parent chain of task {task} does not terminate, cutting");
                break;
            }
            chain.push(id);
            current = self.tasks.get(&id).and_then(|t| t.parent);
        }
        chain
    }

    /// Suspended tasks with a parked chain to sample:
    /// `(task, chain head, last thread)`.
    pub fn suspended(&self) -> impl Iterator<Item = (TaskId, FrameId, Option<ThreadId>)> + '_ {
        self.tasks.values().filter(|task| !task.completed).filter_map(
            |task| task.parked_chain.map(|head| (task.id, head, task.last_thread)),
        )
    }
}
