use bevy::math::Vec3;

use crate::{
    registry::TargetId,
    session::{GameMode, SessionSummary},
};

/// What the game core asks of the presentation layer.
///
/// Hit testing and timing are not here: the core receives an explicit aim ray
/// and runs its own scheduler on the clock it is given.
pub trait Stage {
    fn spawn_visual(&mut self, id: TargetId, position: Vec3, mode: GameMode);
    fn remove_visual(&mut self, id: TargetId);
    fn score_changed(&mut self, _score: u32) {}
    fn game_started(&mut self, _mode: GameMode) {}
    fn game_ended(&mut self, _summary: &SessionSummary) {}
    fn restart_available(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    SpawnVisual { id: TargetId, position: Vec3, mode: GameMode },
    RemoveVisual(TargetId),
    ScoreChanged(u32),
    GameStarted(GameMode),
    GameEnded(SessionSummary),
    RestartAvailable,
}

/// Stage that queues calls for later playback. Bevy systems drain it into
/// entity and UI updates; tests inspect it directly.
#[derive(Debug, Default, Clone)]
pub struct StageLog {
    events: Vec<StageEvent>,
}

impl StageLog {
    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, StageEvent> {
        self.events.drain(..)
    }

    pub fn spawn_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, StageEvent::SpawnVisual { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Stage for StageLog {
    fn spawn_visual(&mut self, id: TargetId, position: Vec3, mode: GameMode) {
        self.events.push(StageEvent::SpawnVisual { id, position, mode });
    }

    fn remove_visual(&mut self, id: TargetId) {
        self.events.push(StageEvent::RemoveVisual(id));
    }

    fn score_changed(&mut self, score: u32) {
        self.events.push(StageEvent::ScoreChanged(score));
    }

    fn game_started(&mut self, mode: GameMode) {
        self.events.push(StageEvent::GameStarted(mode));
    }

    fn game_ended(&mut self, summary: &SessionSummary) {
        self.events.push(StageEvent::GameEnded(summary.clone()));
    }

    fn restart_available(&mut self) {
        self.events.push(StageEvent::RestartAvailable);
    }
}
