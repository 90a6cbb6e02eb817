//! First-person aim trainer: targets appear in front of the player, clicking
//! one scores a point, reaching the win threshold ends the game.
//!
//! The game rules (`machine` down to `placement`) are plain Rust driven by a
//! virtual clock. The Bevy plugins only feed them input and mirror their
//! stage calls into entities and UI.

pub mod aim;
pub mod camera;
pub mod config;
pub mod error;
pub mod hit;
pub mod input;
pub mod lifecycle;
pub mod machine;
pub mod placement;
pub mod plugin;
pub mod registry;
pub mod scheduler;
pub mod score;
pub mod session;
pub mod stage;
pub mod target;
pub mod ui;
pub mod world;

pub use config::{GameConfig, ModeRules};
pub use error::{ConfigError, GameError};
pub use hit::AimRay;
pub use machine::{GameMachine, GamePhase};
pub use plugin::{Session, SessionPlugin};
pub use registry::TargetId;
pub use session::{ClickOutcome, EndReason, GameMode, HitOutcome, SessionSummary};
pub use stage::{Stage, StageEvent, StageLog};
