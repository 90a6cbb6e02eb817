use bevy::{prelude::*, ui::FocusPolicy};

use crate::{
    machine::GamePhase,
    plugin::{GameEndedEvent, ScoreChangedEvent, SessionSet},
};

// Component to mark the crosshair
#[derive(Component, Default)]
pub struct CrosshairMarker;

#[derive(Component)]
pub struct ScoreText;

#[derive(Component)]
pub struct PromptText;

pub fn score_label(score: u32) -> String {
    format!("Score: {score}")
}

pub fn game_over_label(score: u32) -> String {
    format!("{} - Game Over!", score_label(score))
}

pub fn prompt_for(phase: GamePhase) -> &'static str {
    match phase {
        GamePhase::Idle => "Press SPACE to start",
        GamePhase::ModeSelect => "Choose a mode: [1] single target  [2] multi target",
        GamePhase::Playing => "[Q] stop  [Esc] release cursor",
        GamePhase::Ended => "",
    }
}

pub fn setup_ui(mut commands: Commands) {
    // Root node
    commands
        .spawn(NodeBundle {
            style: Style {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                position_type: PositionType::Absolute,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            focus_policy: FocusPolicy::Pass,
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                NodeBundle {
                    style: Style {
                        width: Val::Px(4.0),
                        height: Val::Px(4.0),
                        border: UiRect::all(Val::Px(1.0)),
                        ..default()
                    },
                    background_color: Color::rgba(1.0, 1.0, 1.0, 0.8).into(),
                    border_color: Color::rgba(0.0, 0.0, 0.0, 0.9).into(),
                    visibility: Visibility::Hidden,
                    ..default()
                },
                CrosshairMarker,
            ));
        });

    commands.spawn((
        TextBundle::from_section(
            score_label(0),
            TextStyle {
                font_size: 28.0,
                color: Color::WHITE,
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(16.0),
            ..default()
        }),
        ScoreText,
    ));

    commands.spawn((
        TextBundle::from_section(
            prompt_for(GamePhase::Idle),
            TextStyle {
                font_size: 32.0,
                color: Color::WHITE,
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            bottom: Val::Percent(30.0),
            left: Val::Percent(30.0),
            ..default()
        }),
        PromptText,
    ));
}

pub fn update_score_text(
    mut scores: EventReader<ScoreChangedEvent>,
    mut ended: EventReader<GameEndedEvent>,
    mut query: Query<&mut Text, With<ScoreText>>,
) {
    let Ok(mut text) = query.get_single_mut() else { return };
    for ScoreChangedEvent(score) in scores.read() {
        text.sections[0].value = score_label(*score);
    }
    for GameEndedEvent(summary) in ended.read() {
        text.sections[0].value = game_over_label(summary.score);
    }
}

/// Prompt text and crosshair follow the phase.
pub fn update_phase_ui(
    phase: Res<State<GamePhase>>,
    mut prompts: Query<&mut Text, With<PromptText>>,
    mut crosshairs: Query<&mut Visibility, With<CrosshairMarker>>,
) {
    if !phase.is_changed() {
        return;
    }
    let phase = *phase.get();
    for mut text in &mut prompts {
        text.sections[0].value = prompt_for(phase).to_string();
    }
    for mut visibility in &mut crosshairs {
        *visibility = if phase == GamePhase::Playing { Visibility::Visible } else { Visibility::Hidden };
    }
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_ui)
            .add_systems(Update, (update_score_text, update_phase_ui).in_set(SessionSet::Present));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_the_hud() {
        assert_eq!(score_label(7), "Score: 7");
        assert_eq!(game_over_label(50), "Score: 50 - Game Over!");
        assert!(prompt_for(GamePhase::Ended).is_empty());
    }
}
