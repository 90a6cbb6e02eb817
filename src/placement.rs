use bevy::math::{Vec2, Vec3};
use rand::Rng;

/// Plane on which targets appear, centred on the view axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRegion {
    pub half_extents: Vec2,
    pub depth: f32,
}

/// Sum of two uniform draws shifted to `[-range, range)`. Triangular, so
/// values near the centre are the most likely.
pub fn centered_random<R: Rng + ?Sized>(rng: &mut R, range: f32) -> f32 {
    (rng.gen::<f32>() + rng.gen::<f32>() - 1.0) * range
}

pub fn sample_position<R: Rng + ?Sized>(rng: &mut R, region: &SpawnRegion) -> Vec3 {
    let x = centered_random(rng, region.half_extents.x);
    let y = centered_random(rng, region.half_extents.y);
    Vec3::new(x, y, region.depth)
}

/// Evenly spaced points covering the region, `steps + 1` per axis, edges
/// included. Used when random sampling keeps missing a small free area.
pub fn grid_positions(region: SpawnRegion, steps: u32) -> impl Iterator<Item = Vec3> {
    let steps = steps.max(1);
    let coord = move |k: u32, half: f32| (k as f32 / steps as f32 * 2.0 - 1.0) * half;
    (0..=steps).flat_map(move |i| {
        (0..=steps).map(move |j| {
            Vec3::new(
                coord(i, region.half_extents.x),
                coord(j, region.half_extents.y),
                region.depth,
            )
        })
    })
}
