use std::{
    f32::consts::PI,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, placement::SpawnRegion, session::GameMode};

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV_VAR: &str = "AIM_TRAINER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "aim_trainer.json";

pub const WIN_THRESHOLD: u32 = 50;
pub const FIXED_LIFETIME_MS: u64 = 1000;
pub const MIN_TARGET_DISTANCE: f32 = 2.0;
pub const MULTI_TARGET_CAPACITY: usize = 4;
pub const TARGET_Z: f32 = -3.0;
pub const RESTART_DELAY_MS: u64 = 500;
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 1000;

/// Static rules of one game mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeRules {
    /// Number of simultaneously live targets.
    pub capacity: usize,
    pub lifetime_ms: u64,
    pub min_target_distance: f32,
    pub half_extent_x: f32,
    pub half_extent_y: f32,
    pub spawn_depth: f32,
    /// Keep a fresh target away from the one it replaces.
    pub avoid_previous: bool,
}

impl ModeRules {
    pub fn single_target() -> Self {
        Self {
            capacity: 1,
            avoid_previous: true,
            ..Self::default()
        }
    }

    pub fn multi_target() -> Self {
        Self {
            capacity: MULTI_TARGET_CAPACITY,
            avoid_previous: false,
            ..Self::default()
        }
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms)
    }

    pub fn region(&self) -> SpawnRegion {
        SpawnRegion {
            half_extents: Vec2::new(self.half_extent_x, self.half_extent_y),
            depth: self.spawn_depth,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let invalid = |what: &str| Err(ConfigError::Invalid(format!("{name}: {what}")));

        if self.capacity == 0 {
            return invalid("capacity must be at least 1");
        }
        if self.lifetime_ms == 0 {
            return invalid("lifetime_ms must be positive");
        }
        if !self.min_target_distance.is_finite() || self.min_target_distance < 0.0 {
            return invalid("min_target_distance must be a non-negative number");
        }
        for extent in [self.half_extent_x, self.half_extent_y] {
            if !extent.is_finite() || extent < 0.0 {
                return invalid("half extents must be non-negative numbers");
            }
        }
        if !self.spawn_depth.is_finite() {
            return invalid("spawn_depth must be finite");
        }

        // Necessary (not sufficient) packing bound: `capacity` discs of
        // diameter `d` cannot fit in a region smaller than their total area.
        let d = self.min_target_distance;
        let slots = if self.avoid_previous { self.capacity + 1 } else { self.capacity };
        if slots > 1 && d > 0.0 {
            let available = (2.0 * self.half_extent_x + d) * (2.0 * self.half_extent_y + d);
            let needed = slots as f32 * PI * (d / 2.0).powi(2);
            if needed > available {
                return invalid("spawn region is too small for the target count and separation");
            }
        }
        Ok(())
    }
}

impl Default for ModeRules {
    fn default() -> Self {
        Self {
            capacity: 1,
            lifetime_ms: FIXED_LIFETIME_MS,
            min_target_distance: MIN_TARGET_DISTANCE,
            half_extent_x: 3.0,
            half_extent_y: 1.5,
            spawn_depth: TARGET_Z,
            avoid_previous: false,
        }
    }
}

/// Tunables for the whole game, loaded once at startup.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub win_threshold: u32,
    pub restart_delay_ms: u64,
    pub max_placement_attempts: u32,
    /// Fixed seed for target placement. Random when absent.
    pub seed: Option<u64>,
    pub target_radius: f32,
    /// Radians of rotation per pixel of mouse motion.
    pub mouse_sensitivity: f32,
    pub pitch_limit_deg: f32,
    pub single: ModeRules,
    pub multi: ModeRules,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_threshold: WIN_THRESHOLD,
            restart_delay_ms: RESTART_DELAY_MS,
            max_placement_attempts: MAX_PLACEMENT_ATTEMPTS,
            seed: None,
            target_radius: 0.5,
            mouse_sensitivity: 0.002,
            pitch_limit_deg: 85.0,
            single: ModeRules::single_target(),
            multi: ModeRules::multi_target(),
        }
    }
}

impl GameConfig {
    pub fn rules(&self, mode: GameMode) -> &ModeRules {
        match mode {
            GameMode::SingleTarget => &self.single,
            GameMode::MultiTarget => &self.multi,
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Loads the file named by [`CONFIG_ENV_VAR`], or [`DEFAULT_CONFIG_PATH`].
    /// A missing default file yields the built-in defaults; a missing file that
    /// was asked for explicitly is an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(&PathBuf::from(path)),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.win_threshold == 0 {
            return Err(ConfigError::Invalid("win_threshold must be at least 1".into()));
        }
        if self.max_placement_attempts == 0 {
            return Err(ConfigError::Invalid("max_placement_attempts must be at least 1".into()));
        }
        if !(self.target_radius.is_finite() && self.target_radius > 0.0) {
            return Err(ConfigError::Invalid("target_radius must be positive".into()));
        }
        if !(self.pitch_limit_deg > 0.0 && self.pitch_limit_deg < 90.0) {
            return Err(ConfigError::Invalid("pitch_limit_deg must be within (0, 90)".into()));
        }
        self.single.validate("single")?;
        self.multi.validate("multi")
    }
}
