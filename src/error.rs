use std::path::PathBuf;

use thiserror::Error;

use crate::machine::GamePhase;

/// Faults raised by the game core. Removing a target that is already gone is
/// not one of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Rejection sampling could not find a free spot. The spawn region is too
    /// small for the configured separation and capacity.
    #[error("no valid target position after {attempts} attempts ({live} targets live)")]
    SpawnPlacementExhausted { attempts: u32, live: usize },

    #[error("all {capacity} target slots are already live")]
    PoolFull { capacity: usize },

    /// The caller drove the core out of order (spawn outside Playing, score after the end, ...).
    #[error("`{operation}` is not allowed while {phase:?}")]
    StateViolation {
        operation: &'static str,
        phase: GamePhase,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
