//! Match simulation modules

pub mod action;
pub mod effects;
pub mod physics;
pub mod player;
pub mod projectile;
pub mod session;

pub use action::{Action, ActionRejected, ActionState, ActionStateMachine, ActionTimings};
pub use effects::{Presentation, TracingPresentation};
pub use player::PlayerReplica;
pub use projectile::Projectile;
pub use session::{PeerSession, SessionCommand, SessionError};

pub use glam::Vec3;

use crate::net::protocol::SlotId;

/// Where each seat's player appears
pub const SPAWN_POINTS: [Vec3; 2] = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(100.0, 0.0, 0.0)];

/// Where a killed player is parked, out of every projectile's path
pub const OFF_PLAYFIELD: Vec3 = Vec3::new(0.0, -100.0, 0.0);

pub fn spawn_point(slot: SlotId) -> Vec3 {
    SPAWN_POINTS[slot.index()]
}

/// Facing of a seat: seat 0 shoots along +X, seat 1 along -X
pub fn facing(slot: SlotId) -> Vec3 {
    if slot == SlotId::FIRST {
        Vec3::X
    } else {
        Vec3::NEG_X
    }
}
