use bevy::math::Vec3;

use crate::registry::{Target, TargetId};

/// Shot direction from the eye. `direction` must be normalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimRay {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl AimRay {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Distance along `ray` to the first intersection with a sphere, if any lies
/// in front of the origin.
pub fn intersect_sphere(ray: &AimRay, center: Vec3, radius: f32) -> Option<f32> {
    let origin_to_center = center - ray.origin;
    let projection = origin_to_center.dot(ray.direction);
    let distance_sq = origin_to_center.length_squared() - projection * projection;
    let radius_sq = radius * radius;

    if distance_sq > radius_sq {
        return None;
    }

    let half_chord = (radius_sq - distance_sq).sqrt();
    let near = projection - half_chord;
    let far = projection + half_chord;

    if near > 1e-6 {
        Some(near)
    } else if far > 1e-6 {
        // Origin inside the sphere.
        Some(far)
    } else {
        None
    }
}

/// Closest live target hit by `ray`.
pub fn resolve_hit(ray: &AimRay, targets: &[Target], radius: f32) -> Option<TargetId> {
    targets
        .iter()
        .filter_map(|t| intersect_sphere(ray, t.position, radius).map(|d| (d, t.id)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id)
}
