//! In-memory transport connecting peers inside one process
//!
//! The hub behaves like a relay server: it keeps rooms, picks a master per
//! room, replays buffered calls to late joiners and drops a leaver's
//! buffered calls. Delivery is FIFO per sender. Calls can be held in flight
//! to reproduce crossing broadcasts, and confirmations can be stalled.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::{Envelope, PeerId, RoomOptions, RpcCall, RpcTarget, SlotId};
use super::transport::{Transport, TransportError, TransportEvent};

/// Error code reported when no open room exists
pub const NO_MATCH_FOUND: i16 = 32760;
/// Error code reported when a room name is taken
pub const GAME_ID_ALREADY_EXISTS: i16 = 32766;

enum Inbound {
    Event(TransportEvent),
    Wire(String),
}

#[derive(Default)]
struct PeerLink {
    connected: bool,
    in_lobby: bool,
    room: Option<String>,
    inbox: VecDeque<Inbound>,
}

struct RoomState {
    options: RoomOptions,
    /// Members in join order
    members: Vec<PeerId>,
    master: Option<PeerId>,
    buffer: Vec<Buffered>,
}

struct Buffered {
    sender: PeerId,
    seat: Option<SlotId>,
    payload: String,
}

struct InFlight {
    room: String,
    sender: PeerId,
    target: RpcTarget,
    seat: Option<SlotId>,
    payload: String,
}

#[derive(Default)]
struct HubState {
    region: String,
    peers: HashMap<PeerId, PeerLink>,
    rooms: HashMap<String, RoomState>,
    holding: bool,
    in_flight: Vec<InFlight>,
    create_failures: u32,
    stall_leave_room: bool,
    stall_leave_lobby: bool,
    stall_disconnect: bool,
}

impl HubState {
    fn link(&mut self, peer: PeerId) -> Result<&mut PeerLink, TransportError> {
        self.peers
            .get_mut(&peer)
            .ok_or(TransportError::UnknownPeer(peer))
    }

    fn push_event(&mut self, peer: PeerId, event: TransportEvent) {
        if let Some(link) = self.peers.get_mut(&peer) {
            link.inbox.push_back(Inbound::Event(event));
        }
    }

    fn join(&mut self, peer: PeerId, name: &str) {
        let Some(room) = self.rooms.get_mut(name) else {
            return;
        };
        room.members.push(peer);
        if room.master.is_none() {
            room.master = Some(peer);
        }
        let replay: Vec<String> = room.buffer.iter().map(|call| call.payload.clone()).collect();

        if let Some(link) = self.peers.get_mut(&peer) {
            link.in_lobby = false;
            link.room = Some(name.to_string());
            // Buffered calls land before the join notification
            link.inbox.extend(replay.into_iter().map(Inbound::Wire));
            link.inbox.push_back(Inbound::Event(TransportEvent::JoinedRoom {
                room: name.to_string(),
            }));
        }
    }

    fn leave(&mut self, peer: PeerId) {
        let Some(name) = self.peers.get_mut(&peer).and_then(|link| link.room.take()) else {
            return;
        };

        let mut remaining = Vec::new();
        let mut empty = false;
        if let Some(room) = self.rooms.get_mut(&name) {
            room.members.retain(|member| *member != peer);
            room.buffer.retain(|call| call.sender != peer);
            if room.master == Some(peer) {
                room.master = room.members.first().copied();
            }
            remaining = room.members.clone();
            empty = room.members.is_empty();
        }
        if empty {
            self.rooms.remove(&name);
        }

        for member in remaining {
            self.push_event(member, TransportEvent::PeerLeft { peer });
        }
        // Leaving a room drops the peer back onto the master server
        self.push_event(peer, TransportEvent::ConnectedToMaster);
    }

    fn route(
        &mut self,
        room_name: &str,
        sender: PeerId,
        target: RpcTarget,
        seat: Option<SlotId>,
        payload: String,
    ) {
        let Some(room) = self.rooms.get_mut(room_name) else {
            return;
        };
        let sender_present = room.members.contains(&sender);
        if target == RpcTarget::AllBuffered && sender_present {
            if seat.is_some() {
                // Only a sender's latest call about a seat is replayed
                room.buffer
                    .retain(|call| call.sender != sender || call.seat != seat);
            }
            room.buffer.push(Buffered {
                sender,
                seat,
                payload: payload.clone(),
            });
        }
        let members: Vec<PeerId> = room
            .members
            .iter()
            .copied()
            .filter(|member| *member != sender)
            .collect();
        for member in members {
            if let Some(link) = self.peers.get_mut(&member) {
                link.inbox.push_back(Inbound::Wire(payload.clone()));
            }
        }
    }
}

/// Shared in-memory relay; clone freely
#[derive(Clone)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
    epoch: Instant,
}

impl LoopbackHub {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                region: region.into(),
                ..HubState::default()
            })),
            epoch: Instant::now(),
        }
    }

    /// Register a new peer and hand back its transport
    pub fn add_peer(&self) -> LoopbackTransport {
        let peer = Uuid::new_v4();
        self.state.lock().peers.insert(peer, PeerLink::default());
        LoopbackTransport {
            peer,
            hub: self.clone(),
        }
    }

    /// Keep every broadcast in flight until [`release_deliveries`](Self::release_deliveries)
    pub fn hold_deliveries(&self) {
        self.state.lock().holding = true;
    }

    /// Deliver everything held, in send order, and stop holding
    pub fn release_deliveries(&self) {
        let mut state = self.state.lock();
        state.holding = false;
        let held = std::mem::take(&mut state.in_flight);
        for call in held {
            state.route(&call.room, call.sender, call.target, call.seat, call.payload);
        }
    }

    /// Make the next `count` room creations fail as if the name were taken
    pub fn fail_next_room_creates(&self, count: u32) {
        self.state.lock().create_failures = count;
    }

    /// Ignore leave-room requests while set
    pub fn stall_leave_room(&self, stall: bool) {
        self.state.lock().stall_leave_room = stall;
    }

    /// Ignore leave-lobby requests while set
    pub fn stall_leave_lobby(&self, stall: bool) {
        self.state.lock().stall_leave_lobby = stall;
    }

    /// Ignore disconnect requests while set
    pub fn stall_disconnect(&self, stall: bool) {
        self.state.lock().stall_disconnect = stall;
    }

    /// Hand the master role of the peer's room to that peer
    pub fn transfer_master(&self, peer: PeerId) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let room_name = state
            .link(peer)?
            .room
            .clone()
            .ok_or(TransportError::NotInRoom)?;
        if let Some(room) = state.rooms.get_mut(&room_name) {
            room.master = Some(peer);
        }
        debug!(peer = %peer, room = %room_name, "Master role transferred");
        Ok(())
    }

    /// Names of the rooms that currently exist
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().rooms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Members of a room in join order
    pub fn room_members(&self, room: &str) -> Vec<PeerId> {
        self.state
            .lock()
            .rooms
            .get(room)
            .map(|r| r.members.clone())
            .unwrap_or_default()
    }

    /// Number of calls a late joiner of `room` would have replayed
    pub fn buffered_calls(&self, room: &str) -> usize {
        self.state
            .lock()
            .rooms
            .get(room)
            .map(|r| r.buffer.len())
            .unwrap_or(0)
    }
}

/// One peer's handle onto the hub
#[derive(Clone)]
pub struct LoopbackTransport {
    peer: PeerId,
    hub: LoopbackHub,
}

impl LoopbackTransport {
    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }
}

impl Transport for LoopbackTransport {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    fn connect(&self) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        let link = state.link(self.peer)?;
        if !link.connected {
            link.connected = true;
            link.inbox
                .push_back(Inbound::Event(TransportEvent::ConnectedToMaster));
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        if state.stall_disconnect {
            return Ok(());
        }
        state.leave(self.peer);
        let link = state.link(self.peer)?;
        link.connected = false;
        link.in_lobby = false;
        link.inbox.clear();
        Ok(())
    }

    fn join_lobby(&self) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        let link = state.link(self.peer)?;
        if !link.connected {
            return Err(TransportError::NotConnected);
        }
        link.in_lobby = true;
        Ok(())
    }

    fn leave_lobby(&self) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        if state.stall_leave_lobby {
            return Ok(());
        }
        state.link(self.peer)?.in_lobby = false;
        Ok(())
    }

    fn join_random_room(&self) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        if !state.link(self.peer)?.connected {
            return Err(TransportError::NotConnected);
        }

        let mut candidates: Vec<&String> = state
            .rooms
            .iter()
            .filter(|(_, room)| {
                room.options.is_visible
                    && room.options.is_open
                    && room.members.len() < room.options.max_players as usize
            })
            .map(|(name, _)| name)
            .collect();
        candidates.sort();

        match candidates.first().map(|name| name.to_string()) {
            Some(name) => state.join(self.peer, &name),
            None => state.push_event(
                self.peer,
                TransportEvent::JoinRandomFailed {
                    code: NO_MATCH_FOUND,
                    message: "No match found".to_string(),
                },
            ),
        }
        Ok(())
    }

    fn create_room(&self, name: &str, options: RoomOptions) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        if !state.link(self.peer)?.connected {
            return Err(TransportError::NotConnected);
        }

        let injected = state.create_failures > 0;
        if injected || state.rooms.contains_key(name) {
            if injected {
                state.create_failures -= 1;
            }
            state.push_event(
                self.peer,
                TransportEvent::CreateRoomFailed {
                    code: GAME_ID_ALREADY_EXISTS,
                    message: "A game with the specified id already exist.".to_string(),
                },
            );
            return Ok(());
        }

        state.rooms.insert(
            name.to_string(),
            RoomState {
                options,
                members: Vec::new(),
                master: None,
                buffer: Vec::new(),
            },
        );
        state.join(self.peer, name);
        Ok(())
    }

    fn leave_room(&self) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        if state.stall_leave_room {
            return Ok(());
        }
        state.leave(self.peer);
        Ok(())
    }

    fn broadcast(&self, target: RpcTarget, call: RpcCall) -> Result<(), TransportError> {
        let seat = call.seat();
        let payload = Envelope {
            sender: self.peer,
            call,
        }
        .encode()?;

        let mut state = self.hub.state.lock();
        let room = state
            .link(self.peer)?
            .room
            .clone()
            .ok_or(TransportError::NotInRoom)?;

        if state.holding {
            state.in_flight.push(InFlight {
                room,
                sender: self.peer,
                target,
                seat,
                payload,
            });
        } else {
            state.route(&room, self.peer, target, seat, payload);
        }
        Ok(())
    }

    fn poll_event(&self) -> Option<TransportEvent> {
        loop {
            let inbound = self.hub.state.lock().link(self.peer).ok()?.inbox.pop_front()?;
            match inbound {
                Inbound::Event(event) => return Some(event),
                Inbound::Wire(raw) => match Envelope::decode(&raw) {
                    Ok(envelope) => return Some(TransportEvent::Rpc(envelope)),
                    Err(e) => {
                        warn!(peer = %self.peer, error = %e, "Dropping undecodable call");
                    }
                },
            }
        }
    }

    fn is_room_master(&self) -> bool {
        let state = self.hub.state.lock();
        state
            .peers
            .get(&self.peer)
            .and_then(|link| link.room.as_ref())
            .and_then(|name| state.rooms.get(name))
            .map(|room| room.master == Some(self.peer))
            .unwrap_or(false)
    }

    fn current_region(&self) -> Option<String> {
        let state = self.hub.state.lock();
        let connected = state.peers.get(&self.peer).map(|l| l.connected).unwrap_or(false);
        connected.then(|| state.region.clone())
    }

    fn current_room(&self) -> Option<String> {
        self.hub
            .state
            .lock()
            .peers
            .get(&self.peer)
            .and_then(|link| link.room.clone())
    }

    fn is_connected(&self) -> bool {
        self.hub
            .state
            .lock()
            .peers
            .get(&self.peer)
            .map(|link| link.connected)
            .unwrap_or(false)
    }

    fn is_in_lobby(&self) -> bool {
        self.hub
            .state
            .lock()
            .peers
            .get(&self.peer)
            .map(|link| link.in_lobby)
            .unwrap_or(false)
    }

    fn is_in_room(&self) -> bool {
        self.current_room().is_some()
    }

    fn network_time(&self) -> f64 {
        self.hub.epoch.elapsed().as_secs_f64()
    }
}
