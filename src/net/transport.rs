//! The transport collaborator consumed by the replication core
//!
//! Everything here is fire-and-forget: requests return as soon as they are
//! queued and their outcome arrives later through [`Transport::poll_event`]
//! or shows up in the state queries.

use super::protocol::{Envelope, PeerId, RoomOptions, RpcCall, RpcTarget};

/// Events raised by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connection to the master server is up (raised again after leaving a room)
    ConnectedToMaster,
    /// This peer is now a member of a room
    JoinedRoom { room: String },
    /// No open room was available
    JoinRandomFailed { code: i16, message: String },
    /// Room creation was refused
    CreateRoomFailed { code: i16, message: String },
    /// Another member left the room
    PeerLeft { peer: PeerId },
    /// A broadcast call from another peer
    Rpc(Envelope),
}

/// Operations the core needs from the network layer
pub trait Transport: Send + Sync {
    /// Identity of this peer
    fn local_peer(&self) -> PeerId;

    fn connect(&self) -> Result<(), TransportError>;
    fn disconnect(&self) -> Result<(), TransportError>;
    fn join_lobby(&self) -> Result<(), TransportError>;
    fn leave_lobby(&self) -> Result<(), TransportError>;
    fn join_random_room(&self) -> Result<(), TransportError>;
    fn create_room(&self, name: &str, options: RoomOptions) -> Result<(), TransportError>;
    fn leave_room(&self) -> Result<(), TransportError>;

    /// Send a call to the other peers in the room. The caller runs its own copy.
    fn broadcast(&self, target: RpcTarget, call: RpcCall) -> Result<(), TransportError>;

    /// Next pending event, if any
    fn poll_event(&self) -> Option<TransportEvent>;

    fn is_room_master(&self) -> bool;
    fn current_region(&self) -> Option<String>;
    fn current_room(&self) -> Option<String>;
    fn is_connected(&self) -> bool;
    fn is_in_lobby(&self) -> bool;
    fn is_in_room(&self) -> bool;

    /// Session-wide clock in seconds, shared by every peer
    fn network_time(&self) -> f64;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected to the master server")]
    NotConnected,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Failed to encode call: {0}")]
    Codec(#[from] serde_json::Error),
}
