use aim_trainer::{
    camera::CameraPlugin, input::ControlsPlugin, target::TargetPlugin, ui::UiPlugin, world::WorldPlugin,
    GameConfig, SessionPlugin,
};
use bevy::prelude::*;

fn main() {
    let config = match GameConfig::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid game configuration: {e}");
            std::process::exit(1);
        }
    };

    App::new()
        .insert_resource(config)
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: String::from("Aim Trainer"),
                ..default()
            }),
            ..default()
        }))
        .add_plugins((SessionPlugin, WorldPlugin, CameraPlugin, ControlsPlugin, TargetPlugin, UiPlugin))
        .run();
}
