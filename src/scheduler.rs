use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use crate::registry::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    ExpireTarget(TargetId),
    ShowRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub handle: TimerHandle,
    pub action: ScheduledAction,
    pub due: Duration,
}

/// Delayed actions on a virtual clock. The clock only moves when the owner
/// calls [`Scheduler::pop_due`] / [`Scheduler::settle`], so tests control time
/// completely.
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_handle: u64,
    // Keyed by (due, handle) so equal due times fire in scheduling order.
    pending: BTreeMap<(Duration, u64), ScheduledAction>,
    due_by_handle: HashMap<u64, Duration>,
}

impl Scheduler {
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule_after(&mut self, delay: Duration, action: ScheduledAction) -> TimerHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        let due = self.now + delay;
        self.pending.insert((due, handle), action);
        self.due_by_handle.insert(handle, due);
        TimerHandle(handle)
    }

    /// Returns false when the action already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.due_by_handle.remove(&handle.0) {
            Some(due) => self.pending.remove(&(due, handle.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.due_by_handle.contains_key(&handle.0)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Takes the earliest action due at or before `until`, moving the clock to
    /// its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<Fired> {
        let (&(due, handle), _) = self.pending.first_key_value()?;
        if due > until {
            return None;
        }
        let action = self.pending.remove(&(due, handle))?;
        self.due_by_handle.remove(&handle);
        self.now = self.now.max(due);
        Some(Fired {
            handle: TimerHandle(handle),
            action,
            due,
        })
    }

    /// Moves the clock forward to `until`. Never moves it backwards.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
        self.due_by_handle.clear();
    }
}
