use bevy::math::{EulerRot, Quat, Vec2, Vec3};

use crate::hit::AimRay;

/// First-person view angles in radians. Neutral looks down -Z.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AimOrientation {
    pub yaw: f32,
    pub pitch: f32,
}

impl AimOrientation {
    pub const NEUTRAL: Self = Self { yaw: 0.0, pitch: 0.0 };

    /// Applies a mouse delta in pixels. Pitch is clamped to `±pitch_limit`.
    pub fn look(&mut self, delta: Vec2, sensitivity: f32, pitch_limit: f32) {
        self.yaw -= delta.x * sensitivity;
        self.pitch = (self.pitch - delta.y * sensitivity).clamp(-pitch_limit, pitch_limit);
    }

    pub fn reset(&mut self) {
        *self = Self::NEUTRAL;
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    pub fn ray_from(&self, eye: Vec3) -> AimRay {
        AimRay::new(eye, self.forward())
    }
}
