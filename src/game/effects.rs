//! Audio, animation and UI hooks fired by state transitions
//!
//! These never feed back into the simulation.

use tracing::{debug, info};

use crate::net::protocol::SlotId;

use super::Vec3;

/// Animator triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationCue {
    Jump,
    Duck,
    Fire,
    Damaged,
    Killed,
}

/// Sound effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Jump,
    Duck,
    Fire,
    Hurt,
}

/// Side-effect sink for one peer
pub trait Presentation: Send + Sync {
    fn animate(&self, slot: SlotId, cue: AnimationCue);
    fn play_sound(&self, slot: SlotId, cue: SoundCue);
    fn explosion(&self, at: Vec3);
    fn status(&self, _text: &str) {}
}

/// Presentation that only writes log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresentation;

impl Presentation for TracingPresentation {
    fn animate(&self, slot: SlotId, cue: AnimationCue) {
        debug!(slot = %slot, cue = ?cue, "Animation trigger");
    }

    fn play_sound(&self, slot: SlotId, cue: SoundCue) {
        debug!(slot = %slot, cue = ?cue, "Sound");
    }

    fn explosion(&self, at: Vec3) {
        debug!(x = at.x, y = at.y, z = at.z, "Explosion");
    }

    fn status(&self, text: &str) {
        info!(status = %text, "Status");
    }
}
