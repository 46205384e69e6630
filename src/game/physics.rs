//! Hitboxes and swept collision tests

use super::Vec3;

/// Player hitbox half extents
pub const PLAYER_HALF_EXTENTS: Vec3 = Vec3::new(0.5, 1.0, 0.5);
/// Height of the hitbox centre above the player's feet
pub const PLAYER_CENTER_HEIGHT: f32 = 1.0;

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    pub center: Vec3,
    pub half_extents: Vec3,
}

/// Collision helpers
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Hitbox of a player standing at `position`
    pub fn player_hitbox(position: Vec3) -> Hitbox {
        Hitbox {
            center: position + Vec3::Y * PLAYER_CENTER_HEIGHT,
            half_extents: PLAYER_HALF_EXTENTS,
        }
    }

    /// Check if a sphere of `radius` moving from `from` to `to` touches the box
    pub fn sweep_hits(from: Vec3, to: Vec3, radius: f32, hitbox: &Hitbox) -> bool {
        let (min, max) = hitbox.inflated(radius);
        segment_aabb_enter_t(from, to, min, max).is_some()
    }
}

impl Hitbox {
    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// Corners grown by `margin` on every side
    fn inflated(&self, margin: f32) -> (Vec3, Vec3) {
        (self.min() - Vec3::splat(margin), self.max() + Vec3::splat(margin))
    }
}

/// Parametric `t` in `[0, 1]` at which the segment `[p0, p1]` first enters
/// the box, or None when it never does
pub fn segment_aabb_enter_t(p0: Vec3, p1: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let d = p1 - p0;
    let mut t_enter = 0.0f32;
    let mut t_exit = 1.0f32;

    for axis in 0..3 {
        let start = p0[axis];
        let dir = d[axis];
        if dir.abs() < 1e-6 {
            // Parallel to this slab
            if start < min[axis] || start > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let mut t0 = (min[axis] - start) * inv;
        let mut t1 = (max[axis] - start) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    Some(t_enter)
}
