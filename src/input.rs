use bevy::{prelude::*, window::PrimaryWindow};

use crate::{
    camera::{cursor_locked, set_cursor_lock, AimCamera},
    machine::GamePhase,
    plugin::{AimClicked, ForceStopRequested, ModeChosen, Session, SessionSet, StartRequested},
    session::GameMode,
};

/// Keyboard → start / mode / stop signals, gated on the core's current phase
/// so a stray key never reaches the core out of order.
pub fn keyboard_signals(
    keys: Res<ButtonInput<KeyCode>>,
    session: Res<Session>,
    mut starts: EventWriter<StartRequested>,
    mut modes: EventWriter<ModeChosen>,
    mut stops: EventWriter<ForceStopRequested>,
) {
    match session.machine.phase() {
        // Title screen
        GamePhase::Idle => {
            if keys.just_pressed(KeyCode::Space) {
                starts.send(StartRequested);
            }
        }
        // Mode A or mode B
        GamePhase::ModeSelect => {
            if keys.just_pressed(KeyCode::Digit1) {
                modes.send(ModeChosen(GameMode::SingleTarget));
            } else if keys.just_pressed(KeyCode::Digit2) {
                modes.send(ModeChosen(GameMode::MultiTarget));
            }
        }
        // Q ends the round early
        GamePhase::Playing => {
            if keys.just_pressed(KeyCode::KeyQ) {
                stops.send(ForceStopRequested);
            }
        }
        GamePhase::Ended => {} // Waits for the restart prompt
    }
}

/// Left click shoots along the view axis. With the pointer free, the first
/// click only grabs it again.
pub fn mouse_shots(
    buttons: Res<ButtonInput<MouseButton>>,
    session: Res<Session>,
    mut primary_window: Query<&mut Window, With<PrimaryWindow>>,
    camera: Query<&GlobalTransform, With<AimCamera>>,
    mut clicks: EventWriter<AimClicked>,
) {
    if !buttons.just_pressed(MouseButton::Left) || session.machine.phase() != GamePhase::Playing {
        return;
    }
    let Ok(mut window) = primary_window.get_single_mut() else { return };
    if !cursor_locked(&window) {
        // Re-grab only, this click is not a shot
        set_cursor_lock(&mut window, true);
        return;
    }
    let Ok(eye) = camera.get_single() else { return };

    // Shoot from the eye along the current view direction
    let ray = session.machine.aim().ray_from(eye.translation());
    clicks.send(AimClicked(ray));
}

pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (keyboard_signals, mouse_shots).in_set(SessionSet::Input));
    }
}
