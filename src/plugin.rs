use bevy::prelude::*;

use crate::{
    config::GameConfig,
    error::GameError,
    hit::AimRay,
    machine::{GameMachine, GamePhase},
    registry::TargetId,
    session::{GameMode, SessionSummary},
    stage::{StageEvent, StageLog},
};

// --- Resources ---

/// The game core plus the stage calls it made this frame.
#[derive(Resource, Debug)]
pub struct Session {
    pub machine: GameMachine,
    pub stage: StageLog,
}

impl Session {
    pub fn new(config: GameConfig) -> Self {
        Self {
            machine: GameMachine::new(config),
            stage: StageLog::default(),
        }
    }
}

// --- Input signals (collaborator → core) ---

#[derive(Event, Debug, Clone, Copy)]
pub struct StartRequested;

#[derive(Event, Debug, Clone, Copy)]
pub struct ModeChosen(pub GameMode);

#[derive(Event, Debug, Clone, Copy)]
pub struct AimClicked(pub AimRay);

#[derive(Event, Debug, Clone, Copy)]
pub struct ForceStopRequested;

// --- Output events (core → collaborator) ---

#[derive(Event, Debug, Clone)]
pub struct TargetSpawnedEvent {
    pub id: TargetId,
    pub position: Vec3,
    pub mode: GameMode,
}

#[derive(Event, Debug, Clone)]
pub struct TargetDestroyedEvent {
    pub id: TargetId,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct ScoreChangedEvent(pub u32);

#[derive(Event, Debug, Clone, Copy)]
pub struct GameStartedEvent(pub GameMode);

#[derive(Event, Debug, Clone)]
pub struct GameEndedEvent(pub SessionSummary);

#[derive(Event, Debug, Clone, Copy)]
pub struct RestartAvailableEvent;

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SessionSet {
    /// Devices → signals.
    Input,
    /// Signals and clock → core.
    Drive,
    /// Core → entities and UI.
    Present,
}

// --- Systems ---

fn report<T>(result: Result<T, GameError>) {
    if let Err(err) = result {
        error!("session rejected signal: {err}");
    }
}

/// Feeds this frame's signals and the clock into the core. The clock moves
/// first so anything spawned this frame is stamped with this frame's time.
/// Clicks go through `step`, so a click beats an expiry that falls due in the
/// same frame.
pub fn drive_session(
    time: Res<Time>,
    mut session: ResMut<Session>,
    mut starts: EventReader<StartRequested>,
    mut modes: EventReader<ModeChosen>,
    mut clicks: EventReader<AimClicked>,
    mut stops: EventReader<ForceStopRequested>,
) {
    let now = time.elapsed();
    let Session { machine, stage } = &mut *session;

    report(machine.frame_tick(now, stage));
    for _ in starts.read() {
        report(machine.start_requested());
    }
    for ModeChosen(mode) in modes.read() {
        report(machine.mode_chosen(*mode, stage));
    }
    for AimClicked(ray) in clicks.read() {
        report(machine.step(now, Some(*ray), stage));
    }
    for _ in stops.read() {
        report(machine.force_stop(stage));
    }
}

/// Replays the stage calls recorded by the core as Bevy events.
#[allow(clippy::too_many_arguments)]
pub fn flush_stage(
    mut session: ResMut<Session>,
    mut spawned: EventWriter<TargetSpawnedEvent>,
    mut destroyed: EventWriter<TargetDestroyedEvent>,
    mut scores: EventWriter<ScoreChangedEvent>,
    mut started: EventWriter<GameStartedEvent>,
    mut ended: EventWriter<GameEndedEvent>,
    mut restart: EventWriter<RestartAvailableEvent>,
) {
    for event in session.stage.drain() {
        match event {
            StageEvent::SpawnVisual { id, position, mode } => {
                spawned.send(TargetSpawnedEvent { id, position, mode });
            }
            StageEvent::RemoveVisual(id) => {
                destroyed.send(TargetDestroyedEvent { id });
            }
            StageEvent::ScoreChanged(score) => {
                scores.send(ScoreChangedEvent(score));
            }
            StageEvent::GameStarted(mode) => {
                started.send(GameStartedEvent(mode));
            }
            StageEvent::GameEnded(summary) => {
                ended.send(GameEndedEvent(summary));
            }
            StageEvent::RestartAvailable => {
                restart.send(RestartAvailableEvent);
            }
        }
    }
}

/// Keeps Bevy's `GamePhase` state in step with the core.
pub fn sync_phase(
    session: Res<Session>,
    state: Res<State<GamePhase>>,
    mut next_state: ResMut<NextState<GamePhase>>,
) {
    let phase = session.machine.phase();
    if *state.get() != phase {
        next_state.set(phase);
    }
}

/// Prints each finished session as JSON between markers a launcher can find.
pub fn output_results(mut ended: EventReader<GameEndedEvent>) {
    for GameEndedEvent(summary) in ended.read() {
        info!(
            "{} finished: score {}/{}, accuracy {:.1}%, {} expired",
            summary.mode, summary.score, summary.win_threshold, summary.accuracy, summary.stats.expired
        );
        match summary.to_json() {
            Ok(json) => {
                println!("AIM_TRAINER_RESULTS_START");
                println!("{json}");
                println!("AIM_TRAINER_RESULTS_END");
            }
            Err(e) => error!("failed to serialize session results: {e}"),
        }
    }
}

/// Core game driving. Works headless: needs only time and the ECS.
pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        let config = app.world.get_resource::<GameConfig>().cloned().unwrap_or_default();

        app.insert_resource(Session::new(config.clone()))
            .insert_resource(config)
            .init_state::<GamePhase>()
            .add_event::<StartRequested>()
            .add_event::<ModeChosen>()
            .add_event::<AimClicked>()
            .add_event::<ForceStopRequested>()
            .add_event::<TargetSpawnedEvent>()
            .add_event::<TargetDestroyedEvent>()
            .add_event::<ScoreChangedEvent>()
            .add_event::<GameStartedEvent>()
            .add_event::<GameEndedEvent>()
            .add_event::<RestartAvailableEvent>()
            .configure_sets(Update, (SessionSet::Input, SessionSet::Drive, SessionSet::Present).chain())
            .add_systems(
                Update,
                (drive_session, flush_stage, sync_phase)
                    .chain()
                    .in_set(SessionSet::Drive),
            )
            .add_systems(Update, output_results.in_set(SessionSet::Present));
    }
}
