//! Player replica: owner-authoritative state and its replication

use crate::net::protocol::{PeerId, SlotId};

use super::action::{Action, ActionRejected, ActionState, ActionStateMachine, ActionTimings};
use super::physics::{Hitbox, PhysicsSystem};
use super::{Vec3, OFF_PLAYFIELD};

/// Starting hp of every player
pub const MAX_HP: i32 = 100;

/// When the owner pushes its hp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HpReplication {
    /// Push only when hp changed since the last push
    #[default]
    OnChange,
    /// Push the full value on every fixed tick
    EveryTick,
}

/// Lower bound applied when damage lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HpFloor {
    /// hp stops at zero
    #[default]
    Clamp,
    /// hp may go negative before the kill is observed
    Unclamped,
}

/// One hp broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpPush {
    pub hp: i32,
    pub seq: u64,
}

/// Outcome of applying a replicated hp value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpApplied {
    /// Older than the last accepted push; ignored
    Stale,
    Applied,
    /// Applied, and the value put the player down
    Killed,
}

/// A peer's local view of one player
#[derive(Debug, Clone)]
pub struct PlayerReplica {
    owner: PeerId,
    is_local: bool,
    slot: SlotId,
    hp: i32,
    position: Vec3,
    actions: ActionStateMachine,
    /// Owner: seq of the last push. Replica: seq of the last accepted push.
    hp_seq: u64,
    last_pushed_hp: Option<i32>,
}

impl PlayerReplica {
    /// The player this peer owns and writes
    pub fn new_local(owner: PeerId, slot: SlotId, position: Vec3) -> Self {
        Self::new(owner, true, slot, position)
    }

    /// Another peer's player, only ever updated from its broadcasts
    pub fn new_remote(owner: PeerId, slot: SlotId, position: Vec3) -> Self {
        Self::new(owner, false, slot, position)
    }

    fn new(owner: PeerId, is_local: bool, slot: SlotId, position: Vec3) -> Self {
        Self {
            owner,
            is_local,
            slot,
            hp: MAX_HP,
            position,
            actions: ActionStateMachine::new(),
            hp_seq: 0,
            last_pushed_hp: None,
        }
    }

    pub fn owner(&self) -> PeerId {
        self.owner
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn state(&self) -> ActionState {
        self.actions.state()
    }

    pub fn invincible_until(&self) -> Option<f64> {
        self.actions.invincible_until()
    }

    pub fn has_killed(&self) -> bool {
        self.actions.has_killed()
    }

    pub fn hp_seq(&self) -> u64 {
        self.hp_seq
    }

    pub fn hitbox(&self) -> Hitbox {
        PhysicsSystem::player_hitbox(self.position)
    }

    /// Owner-initiated action; nothing changes when rejected
    pub fn begin_action(
        &mut self,
        action: Action,
        now: f64,
        timings: &ActionTimings,
    ) -> Result<(), ActionRejected> {
        debug_assert!(self.is_local, "only the owner starts actions");
        self.actions.try_begin(action, now, timings)
    }

    /// Replay an action the owner broadcast
    pub fn mirror_action(&mut self, action: Action, now: f64, timings: &ActionTimings) {
        self.actions.enter(action, now, timings);
    }

    /// Apply damage from a collision resolved on this peer.
    /// Returns false, changing nothing, while invincible or killed.
    pub fn got_damaged(
        &mut self,
        amount: i32,
        now: f64,
        timings: &ActionTimings,
        floor: HpFloor,
    ) -> bool {
        debug_assert!(self.is_local, "damage is applied by the owner only");
        if !self.actions.take_damage(now, timings) {
            return false;
        }
        self.hp = match floor {
            HpFloor::Clamp => (self.hp - amount).max(0),
            HpFloor::Unclamped => self.hp - amount,
        };
        true
    }

    /// Terminal transition; parks the player off the playfield
    pub fn kill(&mut self) {
        self.actions.kill();
        self.position = OFF_PLAYFIELD;
    }

    /// Expire timed states
    pub fn tick(&mut self, now: f64) {
        self.actions.tick(now);
    }

    /// Owner side: the hp value to broadcast this tick, if any
    pub fn next_hp_push(&mut self, policy: HpReplication) -> Option<HpPush> {
        if policy == HpReplication::OnChange && self.last_pushed_hp == Some(self.hp) {
            return None;
        }
        self.hp_seq += 1;
        self.last_pushed_hp = Some(self.hp);
        Some(HpPush {
            hp: self.hp,
            seq: self.hp_seq,
        })
    }

    /// Owner side: make the next tick push hp even if it did not change,
    /// for a peer that just built its view of this player
    pub fn resend_hp(&mut self) {
        self.last_pushed_hp = None;
    }

    /// Replica side: take an hp value broadcast by the owner
    pub fn apply_hp_push(&mut self, push: HpPush) -> HpApplied {
        if push.seq <= self.hp_seq {
            return HpApplied::Stale;
        }
        self.hp_seq = push.seq;
        self.hp = push.hp;

        if self.hp <= 0 && !self.has_killed() {
            self.kill();
            HpApplied::Killed
        } else {
            HpApplied::Applied
        }
    }
}
