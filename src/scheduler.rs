//! Single-threaded deferred-task queue on a virtual clock.
//!
//! The surface never sleeps or spawns: it posts a task with a delay and the
//! host loop advances the clock (`advance`) or drains everything that is
//! pending (`run_until_idle` on the surface).  Tasks due at the same instant
//! fire in posting order.

use std::time::Duration;

struct Entry<T> {
    /// Posting sequence number; breaks ties between equal due times.
    seq: u64,
    due: Duration,
    task: T,
}

pub struct Scheduler<T> {
    now: Duration,
    next_seq: u64,
    /// Kept sorted by `(due, seq)`.
    pending: Vec<Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            pending: Vec::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Post `task` to fire `delay` after the current virtual time.
    pub fn schedule(&mut self, delay: Duration, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let due = self.now + delay;
        let pos = self
            .pending
            .partition_point(|e| (e.due, e.seq) <= (due, seq));
        self.pending.insert(pos, Entry { seq, due, task });
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time remaining until the earliest pending task, if any.
    pub fn next_due_in(&self) -> Option<Duration> {
        self.pending
            .first()
            .map(|e| e.due.saturating_sub(self.now))
    }

    /// Advance the clock by `dt` and return every task now due, earliest first.
    pub fn advance(&mut self, dt: Duration) -> Vec<T> {
        self.now += dt;
        let due = self.pending.partition_point(|e| e.due <= self.now);
        self.pending.drain(..due).map(|e| e.task).collect()
    }

    /// Jump to the earliest pending task and return it, or `None` when idle.
    pub fn pop_next(&mut self) -> Option<T> {
        if self.pending.is_empty() {
            return None;
        }
        let entry = self.pending.remove(0);
        if entry.due > self.now {
            self.now = entry.due;
        }
        Some(entry.task)
    }
}
