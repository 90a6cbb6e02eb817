use std::{fmt, time::Duration};

use bevy::log::{debug, info};
use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    config::GameConfig,
    error::GameError,
    hit::{resolve_hit, AimRay},
    lifecycle::TargetLifecycle,
    machine::GamePhase,
    registry::TargetId,
    scheduler::{Scheduler, TimerHandle},
    score::ScoreTracker,
    stage::Stage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    /// Mode A: one target at a time.
    SingleTarget,
    /// Mode B: a pool of simultaneous targets.
    MultiTarget,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::SingleTarget => write!(f, "Mode A (single target)"),
            GameMode::MultiTarget => write!(f, "Mode B (multi target)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Won,
    Stopped,
    /// No legal spawn position could be found.
    PlacementFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Target destroyed, replacement spawned.
    Scored(u32),
    /// Target destroyed and the win threshold reached.
    Won(u32),
    /// Target was already gone.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Hit(HitOutcome),
    Miss,
    /// Not playing; the click is not a shot.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub shots: u32,
    pub misses: u32,
    pub expired: u32,
}

impl SessionStats {
    pub fn accuracy(&self) -> f32 {
        if self.shots == 0 {
            return 0.0;
        }
        (self.shots - self.misses) as f32 / self.shots as f32 * 100.0
    }
}

/// Result of one play-through, handed to the UI and printed as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub mode: GameMode,
    pub reason: EndReason,
    pub score: u32,
    pub win_threshold: u32,
    #[serde(flatten)]
    pub stats: SessionStats,
    pub accuracy: f32,
    pub play_time_ms: u64,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}

impl SessionSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One play-through, from mode selection to the end screen.
#[derive(Debug)]
pub struct GameSession {
    mode: GameMode,
    score: ScoreTracker,
    lifecycle: TargetLifecycle,
    stats: SessionStats,
    target_radius: f32,
    started_at: DateTime<Local>,
    started_clock: Duration,
    ended: bool,
}

impl GameSession {
    pub fn new(mode: GameMode, config: &GameConfig, started_clock: Duration, id_base: u64) -> Self {
        Self {
            mode,
            score: ScoreTracker::new(config.win_threshold),
            lifecycle: TargetLifecycle::new(mode, config.rules(mode), config.max_placement_attempts, id_base),
            stats: SessionStats::default(),
            target_radius: config.target_radius,
            started_at: Local::now(),
            started_clock,
            ended: false,
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn score(&self) -> u32 {
        self.score.score()
    }

    pub fn has_won(&self) -> bool {
        self.score.has_won()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn lifecycle(&self) -> &TargetLifecycle {
        &self.lifecycle
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn ensure_running(&self, operation: &'static str) -> Result<(), GameError> {
        if self.ended {
            return Err(GameError::StateViolation {
                operation,
                phase: GamePhase::Ended,
            });
        }
        Ok(())
    }

    /// Initial spawn: fills every slot of the mode.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<(), GameError> {
        self.ensure_running("start")?;
        stage.score_changed(self.score.score());
        self.lifecycle.fill(rng, scheduler, stage)
    }

    /// Shot along `ray`: scores the closest live target it passes through.
    pub fn click<R: Rng + ?Sized>(
        &mut self,
        ray: &AimRay,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<ClickOutcome, GameError> {
        self.ensure_running("click")?;
        self.stats.shots += 1;
        match resolve_hit(ray, self.lifecycle.live(), self.target_radius) {
            Some(id) => self.hit(id, rng, scheduler, stage).map(ClickOutcome::Hit),
            None => {
                self.stats.misses += 1;
                Ok(ClickOutcome::Miss)
            }
        }
    }

    /// Destroys `id`, scores it and spawns a replacement unless that hit won
    /// the game. The replacement may wait for room, see
    /// [`TargetLifecycle::replenish`].
    pub fn hit<R: Rng + ?Sized>(
        &mut self,
        id: TargetId,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<HitOutcome, GameError> {
        self.ensure_running("hit")?;
        if !self.lifecycle.on_hit(id, scheduler, stage) {
            return Ok(HitOutcome::Stale);
        }

        let score = self.score.record_hit();
        stage.score_changed(score);
        debug!("hit {id}, score {score}");

        if self.score.has_won() {
            return Ok(HitOutcome::Won(score));
        }
        self.lifecycle.replenish(rng, scheduler, stage)?;
        Ok(HitOutcome::Scored(score))
    }

    /// Lifetime of `id` ran out: remove it without scoring and replace it.
    /// Returns whether the expiry took effect.
    pub fn expire<R: Rng + ?Sized>(
        &mut self,
        id: TargetId,
        handle: TimerHandle,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<bool, GameError> {
        if self.ended || !self.lifecycle.on_expire(id, handle, stage) {
            return Ok(false);
        }
        self.stats.expired += 1;
        self.lifecycle.replenish(rng, scheduler, stage)?;
        Ok(true)
    }

    /// Retries slots left empty for lack of room. Returns how many spawned.
    pub fn replenish<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        scheduler: &mut Scheduler,
        stage: &mut dyn Stage,
    ) -> Result<usize, GameError> {
        if self.ended || self.lifecycle.vacancies() == 0 {
            return Ok(0);
        }
        self.lifecycle.replenish(rng, scheduler, stage)
    }

    /// Clears the field and produces the summary. Further calls only return
    /// the summary again with the first reason.
    pub fn finish(&mut self, reason: EndReason, scheduler: &mut Scheduler, stage: &mut dyn Stage) -> SessionSummary {
        if !self.ended {
            self.ended = true;
            self.lifecycle.clear(scheduler, stage);
            info!("{} ended ({reason:?}) with score {}", self.mode, self.score.score());
        }
        SessionSummary {
            mode: self.mode,
            reason,
            score: self.score.score(),
            win_threshold: self.score.threshold(),
            stats: self.stats,
            accuracy: self.stats.accuracy(),
            play_time_ms: scheduler.now().saturating_sub(self.started_clock).as_millis() as u64,
            started_at: self.started_at,
            ended_at: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::stage::StageLog;

    struct Fixture {
        session: GameSession,
        rng: ChaCha8Rng,
        scheduler: Scheduler,
        stage: StageLog,
    }

    fn fixture(mode: GameMode, config: GameConfig) -> Fixture {
        let mut f = Fixture {
            session: GameSession::new(mode, &config, Duration::ZERO, 0),
            rng: ChaCha8Rng::seed_from_u64(9),
            scheduler: Scheduler::default(),
            stage: StageLog::default(),
        };
        f.session.start(&mut f.rng, &mut f.scheduler, &mut f.stage).unwrap();
        f
    }

    fn first_live(session: &GameSession) -> TargetId {
        session.lifecycle().live()[0].id
    }

    #[test]
    fn hit_scores_and_respawns() {
        let mut f = fixture(GameMode::SingleTarget, GameConfig::default());
        let id = first_live(&f.session);

        let outcome = f.session.hit(id, &mut f.rng, &mut f.scheduler, &mut f.stage).unwrap();
        assert_eq!(outcome, HitOutcome::Scored(1));
        assert_eq!(f.session.lifecycle().live().len(), 1);
        assert_ne!(first_live(&f.session), id);
    }

    #[test]
    fn winning_hit_does_not_respawn() {
        let config = GameConfig { win_threshold: 2, ..GameConfig::default() };
        let mut f = fixture(GameMode::SingleTarget, config);

        let id = first_live(&f.session);
        f.session.hit(id, &mut f.rng, &mut f.scheduler, &mut f.stage).unwrap();
        f.stage.clear();
        let id = first_live(&f.session);
        let outcome = f.session.hit(id, &mut f.rng, &mut f.scheduler, &mut f.stage).unwrap();

        assert_eq!(outcome, HitOutcome::Won(2));
        assert_eq!(f.stage.spawn_count(), 0);
        assert!(f.session.lifecycle().live().is_empty());
    }

    #[test]
    fn missed_click_counts_a_miss() {
        let mut f = fixture(GameMode::MultiTarget, GameConfig::default());
        // Straight up from the eye never meets the spawn plane.
        let ray = AimRay::new(bevy::math::Vec3::new(0.0, 0.0, 5.0), bevy::math::Vec3::Y);

        let outcome = f.session.click(&ray, &mut f.rng, &mut f.scheduler, &mut f.stage).unwrap();
        assert_eq!(outcome, ClickOutcome::Miss);
        assert_eq!(f.session.stats(), SessionStats { shots: 1, misses: 1, expired: 0 });
        assert_eq!(f.session.score(), 0);
    }

    #[test]
    fn aimed_click_hits_the_target() {
        let mut f = fixture(GameMode::SingleTarget, GameConfig::default());
        let eye = bevy::math::Vec3::new(0.0, 0.0, 5.0);
        let target = f.session.lifecycle().live()[0].position;
        let ray = AimRay::new(eye, target - eye);

        let outcome = f.session.click(&ray, &mut f.rng, &mut f.scheduler, &mut f.stage).unwrap();
        assert_eq!(outcome, ClickOutcome::Hit(HitOutcome::Scored(1)));
        assert_eq!(f.session.stats().accuracy(), 100.0);
    }

    #[test]
    fn finished_session_rejects_scoring() {
        let mut f = fixture(GameMode::SingleTarget, GameConfig::default());
        let id = first_live(&f.session);
        let summary = f.session.finish(EndReason::Stopped, &mut f.scheduler, &mut f.stage);
        assert_eq!(summary.reason, EndReason::Stopped);

        let err = f.session.hit(id, &mut f.rng, &mut f.scheduler, &mut f.stage).unwrap_err();
        assert!(matches!(err, GameError::StateViolation { operation: "hit", .. }));
    }

    #[test]
    fn summary_serializes_flat() {
        let mut f = fixture(GameMode::MultiTarget, GameConfig::default());
        let summary = f.session.finish(EndReason::Won, &mut f.scheduler, &mut f.stage);
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["mode"], "MultiTarget");
        assert_eq!(json["reason"], "Won");
        assert_eq!(json["shots"], 0);
    }
}
