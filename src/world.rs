use bevy::prelude::*;

pub const BACKGROUND: Color = Color::rgb(0.118, 0.118, 0.118);

// System to light the scene the targets float in
pub fn setup_world(mut commands: Commands) {
    // Directional Light
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 8000.0, // Bright enough to shade the spheres
            shadows_enabled: false, // Targets float in empty space, nothing to cast on
            ..default()
        },
        // Above and behind the player, off to the right
        transform: Transform::from_xyz(2.0, 2.0, 3.0).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });

    // Ambient Light
    commands.insert_resource(AmbientLight {
        color: Color::rgb_u8(0xf1, 0xf1, 0xf1), // Near-white fill
        brightness: 300.0, // Keeps the unlit side readable
    });
}

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        // Dark grey backdrop
        app.insert_resource(ClearColor(BACKGROUND))
            .add_systems(Startup, setup_world);
    }
}
