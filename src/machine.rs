use std::time::Duration;

use bevy::{
    log::{error, info},
    prelude::*,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    aim::AimOrientation,
    config::GameConfig,
    error::GameError,
    hit::AimRay,
    registry::{Target, TargetId},
    scheduler::{Fired, ScheduledAction, Scheduler, TimerHandle},
    session::{ClickOutcome, EndReason, GameMode, GameSession, HitOutcome, SessionSummary},
    stage::Stage,
};

/// Top-level phase of the game. Mirrored into Bevy's state machine so
/// systems can be gated with `in_state`.
#[derive(States, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GamePhase {
    #[default]
    Idle,
    ModeSelect,
    Playing,
    Ended,
}

/// Owns everything that changes while playing: the phase, the current
/// session, the scheduler and the placement rng.
///
/// All calls are synchronous. Within one call the core is never observed half
/// way, which is what makes hit-vs-expiry races resolve to exactly one winner.
#[derive(Debug)]
pub struct GameMachine {
    config: GameConfig,
    phase: GamePhase,
    session: Option<GameSession>,
    last_summary: Option<SessionSummary>,
    scheduler: Scheduler,
    rng: ChaCha8Rng,
    aim: AimOrientation,
    restart_timer: Option<TimerHandle>,
    next_target_id: u64,
}

impl GameMachine {
    pub fn new(config: GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            phase: GamePhase::Idle,
            session: None,
            last_summary: None,
            scheduler: Scheduler::default(),
            rng,
            aim: AimOrientation::NEUTRAL,
            restart_timer: None,
            next_target_id: 0,
        }
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::new(GameConfig {
            seed: Some(seed),
            ..config
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn score(&self) -> u32 {
        match (&self.session, &self.last_summary) {
            (Some(session), _) => session.score(),
            (None, Some(summary)) => summary.score,
            (None, None) => 0,
        }
    }

    pub fn live_targets(&self) -> &[Target] {
        match &self.session {
            Some(session) => session.lifecycle().live(),
            None => &[],
        }
    }

    pub fn aim(&self) -> AimOrientation {
        self.aim
    }

    pub fn look(&mut self, delta: Vec2) {
        if self.phase != GamePhase::Playing {
            return;
        }
        let limit = self.config.pitch_limit_deg.to_radians();
        self.aim.look(delta, self.config.mouse_sensitivity, limit);
    }

    fn violation(&self, operation: &'static str) -> GameError {
        GameError::StateViolation {
            operation,
            phase: self.phase,
        }
    }

    /// Idle → ModeSelect.
    pub fn start_requested(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::Idle {
            return Err(self.violation("start_requested"));
        }
        self.phase = GamePhase::ModeSelect;
        info!("waiting for mode selection");
        Ok(())
    }

    /// ModeSelect → Playing: fresh session, neutral aim, initial spawns.
    pub fn mode_chosen(&mut self, mode: GameMode, stage: &mut dyn Stage) -> Result<(), GameError> {
        if self.phase != GamePhase::ModeSelect {
            return Err(self.violation("mode_chosen"));
        }
        self.phase = GamePhase::Playing;
        self.aim.reset();
        self.last_summary = None;
        info!("starting {mode}");

        let mut session = GameSession::new(mode, &self.config, self.scheduler.now(), self.next_target_id);
        stage.game_started(mode);
        let started = session.start(&mut self.rng, &mut self.scheduler, stage);
        self.session = Some(session);
        started.map_err(|err| self.fault(err, stage))
    }

    /// Shot along an explicit aim ray. Clicks outside Playing are not shots.
    pub fn aim_clicked(&mut self, ray: AimRay, stage: &mut dyn Stage) -> Result<ClickOutcome, GameError> {
        if self.phase != GamePhase::Playing {
            return Ok(ClickOutcome::Ignored);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(self.violation("aim_clicked"));
        };
        match session.click(&ray, &mut self.rng, &mut self.scheduler, stage) {
            Ok(outcome) => {
                if let ClickOutcome::Hit(HitOutcome::Won(_)) = outcome {
                    self.end(EndReason::Won, stage);
                }
                Ok(outcome)
            }
            Err(err) => Err(self.fault(err, stage)),
        }
    }

    /// Direct hit on a resolved target, for collaborators that do their own
    /// hit testing.
    pub fn hit(&mut self, id: TargetId, stage: &mut dyn Stage) -> Result<HitOutcome, GameError> {
        if self.phase != GamePhase::Playing {
            return Err(self.violation("hit"));
        }
        let Some(session) = self.session.as_mut() else {
            return Err(self.violation("hit"));
        };
        match session.hit(id, &mut self.rng, &mut self.scheduler, stage) {
            Ok(outcome) => {
                if let HitOutcome::Won(_) = outcome {
                    self.end(EndReason::Won, stage);
                }
                Ok(outcome)
            }
            Err(err) => Err(self.fault(err, stage)),
        }
    }

    /// Advances the virtual clock to `now`, runs every action due by then and
    /// retries target slots that were left empty for lack of room.
    pub fn frame_tick(&mut self, now: Duration, stage: &mut dyn Stage) -> Result<(), GameError> {
        while let Some(fired) = self.scheduler.pop_due(now) {
            self.run_scheduled(fired, stage)?;
        }
        self.scheduler.settle(now);
        self.refill(stage)
    }

    fn refill(&mut self, stage: &mut dyn Stage) -> Result<(), GameError> {
        if self.phase != GamePhase::Playing {
            return Ok(());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session
            .replenish(&mut self.rng, &mut self.scheduler, stage)
            .map(|_| ())
            .map_err(|err| self.fault(err, stage))
    }

    /// One evaluation step: a click observed at `now` is applied before any
    /// expiry due at the same instant, so the hit wins that race.
    pub fn step(&mut self, now: Duration, click: Option<AimRay>, stage: &mut dyn Stage) -> Result<Option<ClickOutcome>, GameError> {
        self.scheduler.settle(now);
        let outcome = match click {
            Some(ray) => Some(self.aim_clicked(ray, stage)?),
            None => None,
        };
        self.frame_tick(now, stage)?;
        Ok(outcome)
    }

    /// Playing → Ended without a win.
    pub fn force_stop(&mut self, stage: &mut dyn Stage) -> Result<SessionSummary, GameError> {
        if self.phase != GamePhase::Playing {
            return Err(self.violation("force_stop"));
        }
        self.end(EndReason::Stopped, stage)
            .ok_or_else(|| self.violation("force_stop"))
    }

    fn run_scheduled(&mut self, fired: Fired, stage: &mut dyn Stage) -> Result<(), GameError> {
        match fired.action {
            ScheduledAction::ExpireTarget(id) => {
                if self.phase != GamePhase::Playing {
                    return Ok(());
                }
                let Some(session) = self.session.as_mut() else {
                    return Ok(());
                };
                session
                    .expire(id, fired.handle, &mut self.rng, &mut self.scheduler, stage)
                    .map(|_| ())
                    .map_err(|err| self.fault(err, stage))
            }
            ScheduledAction::ShowRestart => {
                if self.phase == GamePhase::Ended && self.restart_timer == Some(fired.handle) {
                    self.restart_timer = None;
                    self.phase = GamePhase::Idle;
                    stage.restart_available();
                    info!("ready for a new game");
                }
                Ok(())
            }
        }
    }

    /// Ends the session on an internal fault and hands the error back.
    fn fault(&mut self, err: GameError, stage: &mut dyn Stage) -> GameError {
        if let GameError::SpawnPlacementExhausted { .. } | GameError::PoolFull { .. } = err {
            error!("placement fault, ending session: {err}");
            self.end(EndReason::PlacementFault, stage);
        }
        err
    }

    /// Playing → Ended: clears the field and schedules the restart prompt.
    fn end(&mut self, reason: EndReason, stage: &mut dyn Stage) -> Option<SessionSummary> {
        if self.phase != GamePhase::Playing {
            return None;
        }
        let mut session = self.session.take()?;
        let summary = session.finish(reason, &mut self.scheduler, stage);
        self.next_target_id = session.lifecycle().registry().next_id();
        self.phase = GamePhase::Ended;

        let delay = self.config.restart_delay();
        self.restart_timer = Some(self.scheduler.schedule_after(delay, ScheduledAction::ShowRestart));
        stage.game_ended(&summary);
        self.last_summary = Some(summary.clone());
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageEvent, StageLog};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn playing(mode: GameMode) -> (GameMachine, StageLog) {
        let mut machine = GameMachine::with_seed(GameConfig::default(), 5);
        let mut stage = StageLog::default();
        machine.start_requested().unwrap();
        machine.mode_chosen(mode, &mut stage).unwrap();
        (machine, stage)
    }

    #[test]
    fn walks_through_the_phases() {
        let mut machine = GameMachine::with_seed(GameConfig::default(), 1);
        let mut stage = StageLog::default();
        assert_eq!(machine.phase(), GamePhase::Idle);

        machine.start_requested().unwrap();
        assert_eq!(machine.phase(), GamePhase::ModeSelect);

        machine.mode_chosen(GameMode::SingleTarget, &mut stage).unwrap();
        assert_eq!(machine.phase(), GamePhase::Playing);
        assert!(matches!(stage.events().first(), Some(StageEvent::GameStarted(GameMode::SingleTarget))));

        machine.force_stop(&mut stage).unwrap();
        assert_eq!(machine.phase(), GamePhase::Ended);
        assert!(machine.live_targets().is_empty());

        machine.frame_tick(ms(499), &mut stage).unwrap();
        assert_eq!(machine.phase(), GamePhase::Ended);
        machine.frame_tick(ms(500), &mut stage).unwrap();
        assert_eq!(machine.phase(), GamePhase::Idle);
        assert_eq!(stage.events().last(), Some(&StageEvent::RestartAvailable));
    }

    #[test]
    fn out_of_order_signals_are_violations() {
        let mut machine = GameMachine::with_seed(GameConfig::default(), 1);
        let mut stage = StageLog::default();

        let err = machine.mode_chosen(GameMode::MultiTarget, &mut stage).unwrap_err();
        assert_eq!(err, GameError::StateViolation { operation: "mode_chosen", phase: GamePhase::Idle });
        assert!(machine.force_stop(&mut stage).is_err());
        assert!(machine.hit(TargetId(0), &mut stage).is_err());

        machine.start_requested().unwrap();
        assert!(machine.start_requested().is_err());
        assert_eq!(stage.spawn_count(), 0);
    }

    #[test]
    fn clicks_outside_play_are_ignored() {
        let mut machine = GameMachine::with_seed(GameConfig::default(), 1);
        let mut stage = StageLog::default();
        let ray = AimRay::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert_eq!(machine.aim_clicked(ray, &mut stage), Ok(ClickOutcome::Ignored));
    }

    #[test]
    fn scoring_after_end_is_rejected() {
        let (mut machine, mut stage) = playing(GameMode::SingleTarget);
        let id = machine.live_targets()[0].id;
        machine.force_stop(&mut stage).unwrap();
        assert_eq!(
            machine.hit(id, &mut stage),
            Err(GameError::StateViolation { operation: "hit", phase: GamePhase::Ended })
        );
        assert_eq!(machine.score(), 0);
    }

    #[test]
    fn new_game_resets_score_and_aim() {
        let (mut machine, mut stage) = playing(GameMode::SingleTarget);
        machine.look(Vec2::new(120.0, -40.0));
        let id = machine.live_targets()[0].id;
        machine.hit(id, &mut stage).unwrap();
        machine.force_stop(&mut stage).unwrap();
        assert_eq!(machine.score(), 1);

        machine.frame_tick(ms(1_000), &mut stage).unwrap();
        machine.start_requested().unwrap();
        machine.mode_chosen(GameMode::MultiTarget, &mut stage).unwrap();

        assert_eq!(machine.score(), 0);
        assert_eq!(machine.aim(), AimOrientation::NEUTRAL);
        assert_eq!(machine.live_targets().len(), 4);
        // Ids keep counting across sessions.
        assert!(machine.live_targets().iter().all(|t| t.id.0 >= 2));
    }

    #[test]
    fn placement_fault_ends_the_session() {
        // The replacement must avoid the spot it replaces, and the region is
        // too small for that.
        let mut config = GameConfig::default();
        config.single.half_extent_x = 0.1;
        config.single.half_extent_y = 0.1;
        config.max_placement_attempts = 20;
        let mut machine = GameMachine::with_seed(config, 3);
        let mut stage = StageLog::default();

        machine.start_requested().unwrap();
        machine.mode_chosen(GameMode::SingleTarget, &mut stage).unwrap();
        let id = machine.live_targets()[0].id;

        let err = machine.hit(id, &mut stage).unwrap_err();
        assert_eq!(err, GameError::SpawnPlacementExhausted { attempts: 20, live: 0 });
        assert_eq!(machine.phase(), GamePhase::Ended);
        assert_eq!(machine.last_summary().map(|s| s.reason), Some(EndReason::PlacementFault));
        assert!(machine.live_targets().is_empty());
    }

    #[test]
    fn crowded_field_keeps_playing_short_handed() {
        let mut config = GameConfig::default();
        config.multi.half_extent_x = 0.1;
        config.multi.half_extent_y = 0.1;
        config.max_placement_attempts = 20;
        let mut machine = GameMachine::with_seed(config, 3);
        let mut stage = StageLog::default();

        machine.start_requested().unwrap();
        machine.mode_chosen(GameMode::MultiTarget, &mut stage).unwrap();
        assert_eq!(machine.live_targets().len(), 1);

        for t in 1..=30 {
            machine.frame_tick(ms(t * 100), &mut stage).unwrap();
            assert_eq!(machine.phase(), GamePhase::Playing);
            assert_eq!(machine.live_targets().len(), 1);
        }
        assert!(machine.session().unwrap().stats().expired >= 2);
    }

    #[test]
    fn look_only_moves_while_playing() {
        let mut machine = GameMachine::with_seed(GameConfig::default(), 1);
        machine.look(Vec2::new(100.0, 100.0));
        assert_eq!(machine.aim(), AimOrientation::NEUTRAL);
    }
}
