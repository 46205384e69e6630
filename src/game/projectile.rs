//! Deterministic projectile simulation
//!
//! Every peer builds its own copy of a projectile from the Fire call alone.
//! Nothing about the flight depends on peer-local state, so all copies
//! agree as long as the peers tick at the same rate.

use uuid::Uuid;

use crate::net::protocol::SlotId;
use crate::util::time::{ticks_for, whole_ticks_in};

use super::physics::{Hitbox, PhysicsSystem};
use super::{facing, Vec3};

/// Weapon stats shared by both seats
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: i32,
    /// Distance travelled per fixed tick
    pub speed_per_tick: f32,
    /// Projectile lifetime (seconds)
    pub lifespan: f64,
    /// Projectile hitbox radius
    pub radius: f32,
    /// Spawn distance in front of the shooter
    pub muzzle_forward: f32,
    /// Spawn height above the shooter's feet
    pub muzzle_height: f32,
}

pub const BULLET: WeaponStats = WeaponStats {
    damage: 10,
    speed_per_tick: 10.0,
    lifespan: 8.0,
    radius: 0.25,
    muzzle_forward: 0.5,
    muzzle_height: 1.0,
};

/// Active projectile on this peer
#[derive(Debug, Clone)]
pub struct Projectile {
    /// Local id, only meaningful on this peer
    pub id: Uuid,
    pub owner_slot: SlotId,
    pub origin: Vec3,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Network time of the shot
    pub spawn_time: f64,
    pub ticks_alive: u64,
    pub ttl_ticks: u64,
    pub damage: i32,
    pub radius: f32,
}

impl Projectile {
    /// Build the projectile fired by `owner_slot` standing at `shooter_position`
    pub fn spawn(
        owner_slot: SlotId,
        shooter_position: Vec3,
        spawn_time: f64,
        stats: &WeaponStats,
        tps: u32,
    ) -> Self {
        let direction = facing(owner_slot);
        let origin = Self::muzzle(owner_slot, shooter_position, stats);
        Self::launch(owner_slot, origin, direction * stats.speed_per_tick, spawn_time, stats, tps)
    }

    /// Build a projectile from an explicit origin and velocity
    pub fn launch(
        owner_slot: SlotId,
        origin: Vec3,
        velocity: Vec3,
        spawn_time: f64,
        stats: &WeaponStats,
        tps: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_slot,
            origin,
            position: origin,
            velocity,
            spawn_time,
            ticks_alive: 0,
            ttl_ticks: ticks_for(stats.lifespan, tps),
            damage: stats.damage,
            radius: stats.radius,
        }
    }

    /// Spawn point in front of a shooter
    pub fn muzzle(owner_slot: SlotId, shooter_position: Vec3, stats: &WeaponStats) -> Vec3 {
        shooter_position
            + facing(owner_slot) * stats.muzzle_forward
            + Vec3::Y * stats.muzzle_height
    }

    /// Position after `ticks` fixed ticks of flight
    pub fn position_after(&self, ticks: u64) -> Vec3 {
        self.origin + self.velocity * ticks as f32
    }

    /// Skip ahead by the ticks that elapsed between the shot and `now`.
    /// Returns the segment covered, for collision checks.
    pub fn catch_up(&mut self, now: f64, tps: u32) -> (Vec3, Vec3) {
        let from = self.position;
        let lag = whole_ticks_in(now - self.spawn_time, tps).min(self.ttl_ticks);
        self.ticks_alive = lag;
        self.position = self.position_after(lag);
        (from, self.position)
    }

    /// Advance one tick. Returns the segment flown, or None once the lifespan is used up.
    pub fn update(&mut self) -> Option<(Vec3, Vec3)> {
        let from = self.position;
        self.ticks_alive += 1;
        self.position = self.position_after(self.ticks_alive);
        if self.is_expired() {
            None
        } else {
            Some((from, self.position))
        }
    }

    pub fn is_expired(&self) -> bool {
        self.ticks_alive >= self.ttl_ticks
    }

    /// Check collision of a flown segment with a target
    pub fn check_hit(&self, from: Vec3, to: Vec3, target: &Hitbox) -> bool {
        PhysicsSystem::sweep_hits(from, to, self.radius, target)
    }
}
