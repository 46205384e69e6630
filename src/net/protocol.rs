//! Broadcast call definitions
//! These are the wire types replicated between peers in a room

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::game::Vec3;

/// Identity of a network participant
pub type PeerId = Uuid;

/// Number of seats in a room
pub const SEAT_COUNT: usize = 2;

/// Exclusive seat index of a match participant (0 or 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotId(u8);

impl SlotId {
    pub const FIRST: SlotId = SlotId(0);
    pub const SECOND: SlotId = SlotId(1);
    pub const ALL: [SlotId; SEAT_COUNT] = [SlotId::FIRST, SlotId::SECOND];

    /// Build a seat id, rejecting anything outside the two seats
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < SEAT_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The opposing seat
    pub fn other(self) -> Self {
        Self(1 - self.0)
    }
}

impl TryFrom<u8> for SlotId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SlotId::new(value).ok_or_else(|| format!("seat {} out of range", value))
    }
}

impl From<SlotId> for u8 {
    fn from(slot: SlotId) -> u8 {
        slot.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who receives a broadcast call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcTarget {
    /// Every peer currently in the room
    All,
    /// Every peer in the room, replayed to peers that join later
    AllBuffered,
}

/// Options used when creating a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOptions {
    pub is_visible: bool,
    pub is_open: bool,
    pub max_players: u8,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            is_visible: true,
            is_open: true,
            max_players: SEAT_COUNT as u8,
        }
    }
}

/// One-shot calls broadcast between peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RpcCall {
    /// Latency check: every peer stamps the moment it ran this call
    DisplaySyncTime,

    /// The sender owns this seat (replicated seat policy)
    SetOccupied { slot: SlotId },

    /// The seat is free again
    SetUnoccupied { slot: SlotId },

    /// Ask the master for a seat (authoritative seat policy)
    RequestSeat,

    /// Final seat decision made by the master
    SeatAssigned { peer: PeerId, slot: SlotId },

    /// The sender's player object appeared at this position
    Instantiate { slot: SlotId, position: Vec3 },

    /// Owner's current hp
    SyncHp {
        hp: i32,
        /// Monotonic per-owner push counter
        seq: u64,
    },

    /// Owner started a jump
    Jump { slot: SlotId },

    /// Owner started ducking
    Duck { slot: SlotId },

    /// Owner fired a projectile
    Fire {
        slot: SlotId,
        /// Network time at which the shot left the muzzle
        spawn_time: f64,
    },

    /// Chat line
    Chat { from: String, text: String },
}

impl RpcCall {
    /// Procedure name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            RpcCall::DisplaySyncTime => "display_sync_time",
            RpcCall::SetOccupied { .. } => "set_occupied",
            RpcCall::SetUnoccupied { .. } => "set_unoccupied",
            RpcCall::RequestSeat => "request_seat",
            RpcCall::SeatAssigned { .. } => "seat_assigned",
            RpcCall::Instantiate { .. } => "instantiate",
            RpcCall::SyncHp { .. } => "sync_hp",
            RpcCall::Jump { .. } => "jump",
            RpcCall::Duck { .. } => "duck",
            RpcCall::Fire { .. } => "fire",
            RpcCall::Chat { .. } => "chat",
        }
    }

    /// Seat whose state this call describes. A later seat call for the same
    /// seat makes an earlier one obsolete.
    pub fn seat(&self) -> Option<SlotId> {
        match self {
            RpcCall::SetOccupied { slot }
            | RpcCall::SetUnoccupied { slot }
            | RpcCall::SeatAssigned { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

/// A call as it travels on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: PeerId,
    pub call: RpcCall,
}

impl Envelope {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
