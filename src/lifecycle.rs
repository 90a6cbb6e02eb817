use std::{collections::HashMap, time::Duration};

use bevy::{
    log::{debug, warn},
    math::Vec3,
};
use rand::Rng;

use crate::{
    config::ModeRules,
    error::GameError,
    placement::{grid_positions, sample_position, SpawnRegion},
    registry::{Target, TargetId, TargetRegistry},
    scheduler::{ScheduledAction, Scheduler, TimerHandle},
    session::GameMode,
    stage::Stage,
};

/// Whole layouts tried by [`TargetLifecycle::fill`].
const FILL_LAYOUTS: u32 = 16;
/// Grid cells per axis when sampling falls back to a scan.
const SCAN_STEPS: u32 = 48;

/// Spawns targets, arms their expiry and takes them down again.
///
/// Each live target has exactly one pending expiry action. Whichever of
/// [`TargetLifecycle::on_hit`] and [`TargetLifecycle::on_expire`] runs first
/// removes the target and that action; the other one then finds nothing and
/// returns `false`.
#[derive(Debug)]
pub struct TargetLifecycle {
    mode: GameMode,
    registry: TargetRegistry,
    expiry: HashMap<TargetId, TimerHandle>,
    region: SpawnRegion,
    lifetime: Duration,
    max_attempts: u32,
    blocked: bool,
}

impl TargetLifecycle {
    pub fn new(mode: GameMode, rules: &ModeRules, max_attempts: u32, id_base: u64) -> Self {
        Self {
            mode,
            registry: TargetRegistry::new(rules.capacity, rules.min_target_distance, rules.avoid_previous)
                .with_id_base(id_base),
            expiry: HashMap::with_capacity(rules.capacity),
            region: rules.region(),
            lifetime: rules.lifetime(),
            max_attempts,
            blocked: false,
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn live(&self) -> &[Target] {
        self.registry.all()
    }

    pub fn expiry_handle(&self, id: TargetId) -> Option<TimerHandle> {
        self.expiry.get(&id).copied()
    }

    /// Empty slots waiting for room to spawn into.
    pub fn vacancies(&self) -> usize {
        self.registry.capacity().saturating_sub(self.registry.len())
    }

    fn exhausted(&self) -> GameError {
        GameError::SpawnPlacementExhausted {
            attempts: self.max_attempts,
            live: self.registry.len(),
        }
    }

    /// A position clear of everything in `registry`: rejection sampling
    /// first, then a grid scan of the region plus the spot freed last.
    fn find_position<R: Rng + ?Sized>(&self, rng: &mut R, registry: &TargetRegistry) -> Option<Vec3> {
        for _ in 0..self.max_attempts {
            let candidate = sample_position(rng, &self.region);
            if registry.is_clear(candidate) {
                return Some(candidate);
            }
        }

        let mut clear: Vec<Vec3> = grid_positions(self.region, SCAN_STEPS)
            .chain(registry.last_removed())
            .filter(|p| registry.is_clear(*p))
            .collect();
        if clear.is_empty() {
            return None;
        }
        let pick = rng.gen_range(0..clear.len());
        Some(clear.swap_remove(pick))
    }

    fn commit(&mut self, position: Vec3, scheduler: &mut Scheduler, stage: &mut dyn Stage) -> Option<TargetId> {
        let id = self.registry.try_spawn(position, scheduler.now(), self.lifetime)?;
        let handle = scheduler.schedule_after(self.lifetime, ScheduledAction::ExpireTarget(id));
        self.expiry.insert(id, handle);
        stage.spawn_visual(id, position, self.mode);
        debug!("spawned {id} at {position}");
        Some(id)
    }

    /// Places one target and arms its expiry.
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<TargetId, GameError> {
        if self.registry.is_full() {
            return Err(GameError::PoolFull {
                capacity: self.registry.capacity(),
            });
        }
        let position = self
            .find_position(rng, &self.registry)
            .ok_or_else(|| self.exhausted())?;
        self.commit(position, scheduler, stage)
            .ok_or_else(|| self.exhausted())
    }

    /// Positions for every empty slot, planned on a scratch copy of the
    /// registry. May come back short when earlier picks box the rest in.
    fn plan_layout<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec3> {
        let mut scratch = self.registry.clone();
        let mut layout = Vec::with_capacity(self.vacancies());
        while !scratch.is_full() {
            let Some(position) = self.find_position(rng, &scratch) else {
                break;
            };
            if scratch.try_spawn(position, Duration::ZERO, self.lifetime).is_none() {
                break;
            }
            layout.push(position);
        }
        layout
    }

    /// Initial spawn of every slot. Whole layouts are retried so three early
    /// targets cannot wall off the fourth; anything still missing is left to
    /// [`TargetLifecycle::replenish`].
    pub fn fill<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<(), GameError> {
        let mut best = Vec::new();
        for _ in 0..FILL_LAYOUTS {
            let layout = self.plan_layout(rng);
            if layout.len() > best.len() {
                best = layout;
            }
            if best.len() >= self.vacancies() {
                break;
            }
        }
        for position in best {
            self.commit(position, scheduler, stage);
        }
        self.replenish(rng, scheduler, stage).map(|_| ())
    }

    /// Spawns into empty slots until full or out of room. With other targets
    /// live a slot without room stays empty and the next call tries again;
    /// their expiry frees space. With nothing live there is no room at all
    /// and that is an error.
    pub fn replenish<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<usize, GameError> {
        let mut spawned = 0;
        while !self.registry.is_full() {
            match self.spawn(rng, scheduler, stage) {
                Ok(_) => spawned += 1,
                Err(err @ GameError::SpawnPlacementExhausted { .. }) if !self.registry.is_empty() => {
                    if !self.blocked {
                        warn!("{err}; {} slot(s) stay empty until room frees up", self.vacancies());
                        self.blocked = true;
                    }
                    return Ok(spawned);
                }
                Err(err) => return Err(err),
            }
        }
        self.blocked = false;
        Ok(spawned)
    }

    /// Takes down a hit target and cancels its expiry. `false` if it was
    /// already gone.
    pub fn on_hit(&mut self, id: TargetId, scheduler: &mut Scheduler, stage: &mut dyn Stage) -> bool {
        if let Some(handle) = self.expiry.remove(&id) {
            scheduler.cancel(handle);
        }
        match self.registry.remove(id) {
            Some(_) => {
                stage.remove_visual(id);
                true
            }
            None => false,
        }
    }

    /// Takes down a target whose lifetime ran out. Ignored unless `handle` is
    /// the expiry armed for this very target.
    pub fn on_expire(&mut self, id: TargetId, handle: TimerHandle, stage: &mut dyn Stage) -> bool {
        if self.expiry.get(&id) != Some(&handle) {
            return false;
        }
        self.expiry.remove(&id);
        match self.registry.remove(id) {
            Some(_) => {
                stage.remove_visual(id);
                debug!("{id} expired");
                true
            }
            None => false,
        }
    }

    /// Removes every live target and cancels all pending expiries.
    pub fn clear(&mut self, scheduler: &mut Scheduler, stage: &mut dyn Stage) {
        for (_, handle) in self.expiry.drain() {
            scheduler.cancel(handle);
        }
        for target in self.registry.clear() {
            stage.remove_visual(target.id);
        }
        self.blocked = false;
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::stage::{StageEvent, StageLog};

    fn lifecycle(rules: &ModeRules) -> TargetLifecycle {
        TargetLifecycle::new(GameMode::MultiTarget, rules, 1000, 0)
    }

    fn pairwise_separated(targets: &[Target], min: f32) -> bool {
        targets.iter().enumerate().all(|(i, a)| {
            targets[i + 1..]
                .iter()
                .all(|b| a.position.distance(b.position) >= min)
        })
    }

    #[test]
    fn fill_keeps_targets_apart() {
        let rules = ModeRules::multi_target();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        for round in 0..50 {
            let mut pool = TargetLifecycle::new(GameMode::MultiTarget, &rules, 1000, round * 10);
            pool.fill(&mut rng, &mut scheduler, &mut stage).expect("default region fits 4");
            assert_eq!(pool.live().len(), 4);
            assert!(pairwise_separated(pool.live(), rules.min_target_distance));
        }
    }

    #[test]
    fn spawn_arms_expiry_at_lifetime() {
        let rules = ModeRules::single_target();
        let mut pool = lifecycle(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        let id = pool.spawn(&mut rng, &mut scheduler, &mut stage).unwrap();
        assert!(matches!(stage.events(), [StageEvent::SpawnVisual { id: seen, .. }] if *seen == id));

        assert!(scheduler.pop_due(Duration::from_millis(999)).is_none());
        let fired = scheduler.pop_due(Duration::from_millis(1000)).expect("expiry due");
        assert_eq!(fired.action, ScheduledAction::ExpireTarget(id));
        assert_eq!(Some(fired.handle), pool.expiry_handle(id));
    }

    #[test]
    fn hit_cancels_expiry() {
        let rules = ModeRules::single_target();
        let mut pool = lifecycle(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        let id = pool.spawn(&mut rng, &mut scheduler, &mut stage).unwrap();
        let handle = pool.expiry_handle(id).unwrap();

        assert!(pool.on_hit(id, &mut scheduler, &mut stage));
        assert!(!scheduler.is_pending(handle));
        assert!(!pool.on_expire(id, handle, &mut stage));
        assert!(!pool.on_hit(id, &mut scheduler, &mut stage));
        assert!(pool.live().is_empty());
    }

    #[test]
    fn expiry_from_a_stale_timer_is_ignored() {
        let rules = ModeRules::multi_target();
        let mut pool = lifecycle(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        let a = pool.spawn(&mut rng, &mut scheduler, &mut stage).unwrap();
        let b = pool.spawn(&mut rng, &mut scheduler, &mut stage).unwrap();
        let handle_b = pool.expiry_handle(b).unwrap();

        // b's timer cannot take down a.
        assert!(!pool.on_expire(a, handle_b, &mut stage));
        assert!(pool.registry().contains(a));
        assert!(pool.on_expire(b, handle_b, &mut stage));
        assert!(!pool.registry().contains(b));
    }

    #[test]
    fn crowded_region_leaves_slots_empty() {
        let rules = ModeRules {
            capacity: 3,
            half_extent_x: 0.1,
            half_extent_y: 0.1,
            ..ModeRules::multi_target()
        };
        let mut pool = TargetLifecycle::new(GameMode::MultiTarget, &rules, 50, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        pool.fill(&mut rng, &mut scheduler, &mut stage).unwrap();
        assert_eq!(pool.live().len(), 1);
        assert_eq!(pool.vacancies(), 2);
        assert_eq!(pool.replenish(&mut rng, &mut scheduler, &mut stage), Ok(0));
        assert_eq!(stage.spawn_count(), 1);
    }

    #[test]
    fn no_room_on_an_empty_field_is_an_error() {
        let rules = ModeRules {
            half_extent_x: 0.1,
            half_extent_y: 0.1,
            ..ModeRules::single_target()
        };
        let mut pool = TargetLifecycle::new(GameMode::SingleTarget, &rules, 50, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        let id = pool.spawn(&mut rng, &mut scheduler, &mut stage).unwrap();
        assert!(pool.on_hit(id, &mut scheduler, &mut stage));

        let err = pool.replenish(&mut rng, &mut scheduler, &mut stage).unwrap_err();
        assert_eq!(err, GameError::SpawnPlacementExhausted { attempts: 50, live: 0 });
    }

    #[test]
    fn default_multi_field_always_refills() {
        let rules = ModeRules::multi_target();
        for seed in 0..100 {
            let mut pool = lifecycle(&rules);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut scheduler = Scheduler::default();
            let mut stage = StageLog::default();

            pool.fill(&mut rng, &mut scheduler, &mut stage).unwrap();
            assert_eq!(pool.live().len(), 4, "seed {seed}: initial fill");

            for round in 0..20 {
                let id = pool.live()[round % 4].id;
                assert!(pool.on_hit(id, &mut scheduler, &mut stage));
                assert_eq!(pool.replenish(&mut rng, &mut scheduler, &mut stage), Ok(1));
                assert_eq!(pool.live().len(), 4, "seed {seed}, round {round}");
                assert!(pairwise_separated(pool.live(), rules.min_target_distance));
            }
        }
    }

    #[test]
    fn full_pool_refuses_to_spawn() {
        let rules = ModeRules::single_target();
        let mut pool = lifecycle(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        pool.spawn(&mut rng, &mut scheduler, &mut stage).unwrap();
        assert_eq!(
            pool.spawn(&mut rng, &mut scheduler, &mut stage),
            Err(GameError::PoolFull { capacity: 1 })
        );
    }

    #[test]
    fn clear_cancels_everything() {
        let rules = ModeRules::multi_target();
        let mut pool = lifecycle(&rules);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut scheduler = Scheduler::default();
        let mut stage = StageLog::default();

        pool.fill(&mut rng, &mut scheduler, &mut stage).unwrap();
        stage.clear();
        pool.clear(&mut scheduler, &mut stage);

        assert!(pool.live().is_empty());
        assert_eq!(scheduler.pending_len(), 0);
        let removed = stage
            .events()
            .iter()
            .filter(|e| matches!(e, StageEvent::RemoveVisual(_)))
            .count();
        assert_eq!(removed, 4);
    }
}
