//! Deferred tick queue.
//!
//! The grid runs inside a host's update cycle and never blocks. Work that has
//! to happen "after the current operation" is posted here in one of two lanes:
//!
//! - [`Lane::NextTick`]: runs at the start of the next settle pass, before
//!   anything else (microtask semantics).
//! - [`Lane::Macrotask`]: runs after every next-tick item of the same pass has
//!   been handed out, so it observes state produced by those items.
//!
//! The queue stores plain values rather than closures; the owner decides what
//! a task means when it drains it.

use std::collections::VecDeque;

use crate::logging::targets;

/// A unique identifier for a deferred task, scoped to one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Which lane a task is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Runs first on the next settle.
    NextTick,
    /// Runs after all next-tick work of the same settle.
    Macrotask,
}

/// Internal task data.
#[derive(Debug)]
struct TaskData<T> {
    id: TaskId,
    task: T,
}

/// Two-lane FIFO of deferred work items.
#[derive(Debug)]
pub struct TickQueue<T> {
    micro: VecDeque<TaskData<T>>,
    macro_tasks: VecDeque<TaskData<T>>,
    next_id: u64,
}

impl<T> TickQueue<T> {
    /// Create a new, empty queue.
    pub fn new() -> Self {
        Self {
            micro: VecDeque::new(),
            macro_tasks: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Post a task to the given lane.
    ///
    /// Returns the task ID that can be used to cancel the task.
    pub fn post(&mut self, lane: Lane, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let data = TaskData { id, task };
        match lane {
            Lane::NextTick => self.micro.push_back(data),
            Lane::Macrotask => self.macro_tasks.push_back(data),
        }
        tracing::trace!(target: targets::SCHEDULER, id = id.0, ?lane, "task posted");
        id
    }

    /// Cancel a pending task.
    ///
    /// Returns the task if it was still pending.
    pub fn cancel(&mut self, id: TaskId) -> Option<T> {
        for lane in [&mut self.micro, &mut self.macro_tasks] {
            if let Some(pos) = lane.iter().position(|t| t.id == id) {
                return lane.remove(pos).map(|t| t.task);
            }
        }
        None
    }

    /// Drop every pending task matching `predicate`.
    ///
    /// Returns the number of tasks removed.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.pending_count();
        self.micro.retain(|t| !predicate(&t.task));
        self.macro_tasks.retain(|t| !predicate(&t.task));
        before - self.pending_count()
    }

    /// Check if there are any pending tasks.
    pub fn has_pending(&self) -> bool {
        !self.micro.is_empty() || !self.macro_tasks.is_empty()
    }

    /// Get the number of pending tasks across both lanes.
    pub fn pending_count(&self) -> usize {
        self.micro.len() + self.macro_tasks.len()
    }

    /// Take every next-tick task, in posting order.
    pub fn drain_next_tick(&mut self) -> Vec<T> {
        self.micro.drain(..).map(|t| t.task).collect()
    }

    /// Take one settle pass worth of work: all next-tick tasks, then all
    /// macrotasks that were pending when the call started.
    pub fn drain_turn(&mut self) -> Vec<T> {
        let mut out: Vec<T> = self.micro.drain(..).map(|t| t.task).collect();
        out.extend(self.macro_tasks.drain(..).map(|t| t.task));
        out
    }
}

impl<T> Default for TickQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
