use std::{fmt, time::Duration};

use bevy::math::Vec3;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: TargetId,
    pub position: Vec3,
    pub spawned_at: Duration,
    pub expires_at: Duration,
}

/// Live targets of one session. Placement rules are checked on insert only;
/// nothing here moves a target once it exists.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    capacity: usize,
    min_distance: f32,
    avoid_previous: bool,
    targets: Vec<Target>,
    last_removed: Option<Vec3>,
    next_id: u64,
}

impl TargetRegistry {
    pub fn new(capacity: usize, min_distance: f32, avoid_previous: bool) -> Self {
        Self {
            capacity,
            min_distance,
            avoid_previous,
            targets: Vec::with_capacity(capacity),
            last_removed: None,
            next_id: 0,
        }
    }

    /// Continues id allocation from `base`, so ids stay unique across sessions.
    pub fn with_id_base(mut self, base: u64) -> Self {
        self.next_id = base;
        self
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Position of the most recently removed target in this session.
    pub fn last_removed(&self) -> Option<Vec3> {
        self.last_removed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.targets.len() >= self.capacity
    }

    /// True when `candidate` keeps the minimum separation from every live
    /// target (and from the last removed one, when the mode asks for it).
    pub fn is_clear(&self, candidate: Vec3) -> bool {
        let min_sq = self.min_distance * self.min_distance;
        let clear_of_live = self
            .targets
            .iter()
            .all(|t| t.position.distance_squared(candidate) >= min_sq);
        let clear_of_previous = match (self.avoid_previous, self.last_removed) {
            (true, Some(previous)) => previous.distance_squared(candidate) >= min_sq,
            _ => true,
        };
        clear_of_live && clear_of_previous
    }

    /// Registers a target at `candidate` unless it is too close to another
    /// one or the registry is full.
    pub fn try_spawn(&mut self, candidate: Vec3, now: Duration, lifetime: Duration) -> Option<TargetId> {
        if self.is_full() || !self.is_clear(candidate) {
            return None;
        }
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.targets.push(Target {
            id,
            position: candidate,
            spawned_at: now,
            expires_at: now + lifetime,
        });
        Some(id)
    }

    /// Removes `id` if it is live. Removing twice is a no-op.
    pub fn remove(&mut self, id: TargetId) -> Option<Target> {
        let index = self.targets.iter().position(|t| t.id == id)?;
        let target = self.targets.swap_remove(index);
        self.last_removed = Some(target.position);
        Some(target)
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Drops every live target and returns them. Ids keep counting up.
    pub fn clear(&mut self) -> Vec<Target> {
        self.last_removed = None;
        std::mem::take(&mut self.targets)
    }
}
