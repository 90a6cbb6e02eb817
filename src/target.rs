use bevy::{pbr::NotShadowCaster, prelude::*, utils::HashMap};

use crate::{
    config::GameConfig,
    plugin::{SessionSet, TargetDestroyedEvent, TargetSpawnedEvent},
    registry::TargetId,
    session::GameMode,
};

/// Visual of one live target. Game rules never read this; the core owns the
/// target itself.
#[derive(Component, Debug, Clone, Copy)]
pub struct TargetVisual {
    pub id: TargetId,
}

#[derive(Resource)]
pub struct TargetAssets {
    mesh: Handle<Mesh>,
    single: Handle<StandardMaterial>,
    multi: Handle<StandardMaterial>,
}

impl TargetAssets {
    fn material(&self, mode: GameMode) -> Handle<StandardMaterial> {
        match mode {
            GameMode::SingleTarget => self.single.clone(),
            GameMode::MultiTarget => self.multi.clone(),
        }
    }
}

/// Entity of each live target visual.
#[derive(Resource, Default)]
pub struct TargetEntities(HashMap<TargetId, Entity>);

fn target_material(color: Color) -> StandardMaterial {
    StandardMaterial {
        base_color: color,
        perceptual_roughness: 0.5, // Soft highlight
        ..default()
    }
}

pub fn setup_target_assets(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.insert_resource(TargetAssets {
        // One sphere mesh shared by every target
        mesh: meshes.add(Sphere::new(config.target_radius)),
        // Mode A yellow, mode B teal.
        single: materials.add(target_material(Color::rgb_u8(0xfb, 0xff, 0x00))),
        multi: materials.add(target_material(Color::rgb_u8(0x00, 0xff, 0xd0))),
    });
}

pub fn spawn_target_visuals(
    mut commands: Commands,
    assets: Res<TargetAssets>,
    mut entities: ResMut<TargetEntities>,
    mut spawned: EventReader<TargetSpawnedEvent>,
) {
    for event in spawned.read() {
        // Spawn the sphere where the core placed the target
        let entity = commands
            .spawn((
                PbrBundle {
                    mesh: assets.mesh.clone(),
                    material: assets.material(event.mode),
                    transform: Transform::from_translation(event.position),
                    ..default()
                },
                TargetVisual { id: event.id },
                NotShadowCaster,
            ))
            .id();
        // Remember the entity so the matching destroy event can find it
        entities.0.insert(event.id, entity);
    }
}

pub fn despawn_target_visuals(
    mut commands: Commands,
    mut entities: ResMut<TargetEntities>,
    mut destroyed: EventReader<TargetDestroyedEvent>,
) {
    for event in destroyed.read() {
        // Already gone is fine: removal is idempotent.
        if let Some(entity) = entities.0.remove(&event.id) {
            commands.entity(entity).despawn_recursive();
        }
    }
}

pub struct TargetPlugin;

impl Plugin for TargetPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TargetEntities>()
            .add_systems(Startup, setup_target_assets)
            .add_systems(
                Update,
                (despawn_target_visuals, spawn_target_visuals)
                    .chain()
                    .in_set(SessionSet::Present),
            );
    }
}
