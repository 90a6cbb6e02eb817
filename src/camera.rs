use bevy::{
    input::mouse::MouseMotion,
    prelude::*,
    window::{CursorGrabMode, PrimaryWindow},
};

use crate::{
    machine::GamePhase,
    plugin::{Session, SessionSet},
};

/// Eye position of the first-person view.
pub const EYE_POSITION: Vec3 = Vec3::new(0.0, 0.0, 5.0);
const CAMERA_FOV_DEG: f32 = 75.0;

#[derive(Component)]
pub struct AimCamera;

pub fn setup_camera(mut commands: Commands) {
    commands.spawn((
        Camera3dBundle {
            // Eye sits in front of the target plane, looking down -Z
            transform: Transform::from_translation(EYE_POSITION),
            projection: Projection::Perspective(PerspectiveProjection {
                fov: CAMERA_FOV_DEG.to_radians(),
                near: 0.1, // Close enough for nothing to clip
                far: 1000.0,
                ..default()
            }),
            ..default()
        },
        AimCamera,
    ));
}

pub fn cursor_locked(window: &Window) -> bool {
    window.cursor.grab_mode == CursorGrabMode::Locked
}

pub fn set_cursor_lock(window: &mut Window, locked: bool) {
    window.cursor.grab_mode = if locked { CursorGrabMode::Locked } else { CursorGrabMode::None };
    // Hidden while locked, the crosshair stands in for it
    window.cursor.visible = !locked;
}

/// Mouse motion turns the view, but only while the pointer is locked.
pub fn mouse_look(
    mut mouse_motion_events: EventReader<MouseMotion>,
    primary_window: Query<&Window, With<PrimaryWindow>>,
    mut session: ResMut<Session>,
) {
    let locked = primary_window.get_single().map_or(false, cursor_locked);
    if !locked {
        // Drop motion from a free pointer so it doesn't turn the view later
        mouse_motion_events.clear();
        return;
    }

    // Sum all motion since last frame
    let delta: Vec2 = mouse_motion_events.read().map(|event| event.delta).sum();
    if delta != Vec2::ZERO {
        session.machine.look(delta);
    }
}

/// Copies the core's aim orientation onto the camera (this also applies the
/// reset to neutral at game start).
pub fn apply_aim(session: Res<Session>, mut cameras: Query<&mut Transform, With<AimCamera>>) {
    let rotation = session.machine.aim().rotation(); // Yaw then pitch, no roll
    for mut transform in &mut cameras {
        transform.rotation = rotation;
    }
}

fn lock_on_play(mut primary_window: Query<&mut Window, With<PrimaryWindow>>) {
    if let Ok(mut window) = primary_window.get_single_mut() {
        set_cursor_lock(&mut window, true);
    }
}

fn release_on_end(mut primary_window: Query<&mut Window, With<PrimaryWindow>>) {
    if let Ok(mut window) = primary_window.get_single_mut() {
        set_cursor_lock(&mut window, false);
    }
}

fn release_on_escape(key: Res<ButtonInput<KeyCode>>, mut primary_window: Query<&mut Window, With<PrimaryWindow>>) {
    if !key.just_pressed(KeyCode::Escape) {
        return;
    }
    if let Ok(mut window) = primary_window.get_single_mut() {
        set_cursor_lock(&mut window, false);
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(OnEnter(GamePhase::Playing), lock_on_play)
            .add_systems(OnEnter(GamePhase::Ended), release_on_end)
            .add_systems(Update, (release_on_escape, mouse_look).chain().in_set(SessionSet::Input))
            .add_systems(Update, apply_aim.in_set(SessionSet::Present));
    }
}
