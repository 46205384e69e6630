//! Seat arbitration
//!
//! Two policies exist. `Replicated` lets every peer pick its own seat from
//! a replicated occupancy table using the master flag as tie-break; two
//! joins whose claims cross in flight can end up on the same seat.
//! `Authoritative` lets only the master allocate, so every seat decision
//! comes from a single table.

use tracing::{debug, info, warn};

use crate::net::protocol::{PeerId, RpcCall, RpcTarget, SlotId, SEAT_COUNT};
use crate::net::transport::{Transport, TransportError};

/// How seats are handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeatPolicy {
    /// The master allocates and broadcasts the final assignment
    #[default]
    Authoritative,
    /// Each peer picks from the occupancy flags and announces its pick
    Replicated,
}

/// Seat a peer asks for given the occupancy it currently sees
pub fn preferred_seat(is_master: bool, occupancy: &[bool; SEAT_COUNT]) -> SlotId {
    if is_master {
        if occupancy[0] {
            SlotId::SECOND
        } else {
            SlotId::FIRST
        }
    } else if occupancy[1] {
        SlotId::FIRST
    } else {
        SlotId::SECOND
    }
}

/// Which peer holds which seat, as far as this peer knows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeatTable {
    owners: [Option<PeerId>; SEAT_COUNT],
}

impl SeatTable {
    pub fn occupancy(&self) -> [bool; SEAT_COUNT] {
        [self.owners[0].is_some(), self.owners[1].is_some()]
    }

    pub fn owner(&self, slot: SlotId) -> Option<PeerId> {
        self.owners[slot.index()]
    }

    pub fn seat_of(&self, peer: PeerId) -> Option<SlotId> {
        SlotId::ALL
            .into_iter()
            .find(|slot| self.owners[slot.index()] == Some(peer))
    }

    pub fn first_free(&self) -> Option<SlotId> {
        SlotId::ALL
            .into_iter()
            .find(|slot| self.owners[slot.index()].is_none())
    }

    /// Record `peer` on `slot`, returning whoever was there before
    pub fn claim(&mut self, slot: SlotId, peer: PeerId) -> Option<PeerId> {
        self.owners[slot.index()].replace(peer)
    }

    pub fn release(&mut self, slot: SlotId) -> Option<PeerId> {
        self.owners[slot.index()].take()
    }

    pub fn release_peer(&mut self, peer: PeerId) -> Option<SlotId> {
        let slot = self.seat_of(peer)?;
        self.owners[slot.index()] = None;
        Some(slot)
    }
}

/// Result of joining a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatDecision {
    /// Seat known; the local player can spawn
    Assigned(SlotId),
    /// Waiting for the master's assignment
    Pending,
}

/// Seat arbitration state of one peer
pub struct SlotArbitrator {
    policy: SeatPolicy,
    local_peer: PeerId,
    table: SeatTable,
    local: Option<SlotId>,
    /// Set between our seat request and the master's answer
    awaiting_assignment: bool,
    seat_broadcasts: u32,
}

impl SlotArbitrator {
    pub fn new(policy: SeatPolicy, local_peer: PeerId) -> Self {
        Self {
            policy,
            local_peer,
            table: SeatTable::default(),
            local: None,
            awaiting_assignment: false,
            seat_broadcasts: 0,
        }
    }

    pub fn policy(&self) -> SeatPolicy {
        self.policy
    }

    pub fn local_slot(&self) -> Option<SlotId> {
        self.local
    }

    pub fn occupancy(&self) -> [bool; SEAT_COUNT] {
        self.table.occupancy()
    }

    pub fn table(&self) -> &SeatTable {
        &self.table
    }

    /// Seat claims, requests and assignments this peer has broadcast
    pub fn seat_broadcasts(&self) -> u32 {
        self.seat_broadcasts
    }

    /// Decide (or ask for) a seat right after joining a room
    pub fn on_joined_room(&mut self, transport: &dyn Transport) -> Result<SeatDecision, TransportError> {
        let is_master = transport.is_room_master();

        match self.policy {
            SeatPolicy::Replicated => {
                // Assigned locally without waiting for our own claim to come back
                let slot = preferred_seat(is_master, &self.table.occupancy());
                self.table.claim(slot, self.local_peer);
                self.local = Some(slot);
                self.send(transport, RpcTarget::AllBuffered, RpcCall::SetOccupied { slot })?;
                info!(peer = %self.local_peer, slot = %slot, is_master, "Seat claimed");
                Ok(SeatDecision::Assigned(slot))
            }
            SeatPolicy::Authoritative if is_master => {
                let slot = self
                    .table
                    .first_free()
                    .unwrap_or_else(|| preferred_seat(true, &self.table.occupancy()));
                self.assign(transport, self.local_peer, slot)?;
                self.local = Some(slot);
                info!(peer = %self.local_peer, slot = %slot, "Master seated itself");
                Ok(SeatDecision::Assigned(slot))
            }
            SeatPolicy::Authoritative => {
                self.awaiting_assignment = true;
                self.send(transport, RpcTarget::All, RpcCall::RequestSeat)?;
                debug!(peer = %self.local_peer, "Seat requested from master");
                Ok(SeatDecision::Pending)
            }
        }
    }

    /// Another peer announced its seat
    pub fn on_set_occupied(&mut self, sender: PeerId, slot: SlotId) {
        if let Some(previous) = self.table.claim(slot, sender) {
            if previous != sender {
                warn!(
                    slot = %slot,
                    previous = %previous,
                    claimant = %sender,
                    "Seat claimed twice"
                );
            }
        }
    }

    pub fn on_set_unoccupied(&mut self, slot: SlotId) {
        self.table.release(slot);
    }

    /// Master side of a seat request
    pub fn on_request_seat(
        &mut self,
        sender: PeerId,
        transport: &dyn Transport,
    ) -> Result<(), TransportError> {
        if self.policy != SeatPolicy::Authoritative || !transport.is_room_master() {
            return Ok(());
        }
        if self.table.seat_of(sender).is_some() {
            debug!(peer = %sender, "Duplicate seat request ignored");
            return Ok(());
        }
        match self.table.first_free() {
            Some(slot) => self.assign(transport, sender, slot),
            None => {
                warn!(peer = %sender, "No free seat for request");
                Ok(())
            }
        }
    }

    /// A seat assignment from the master. Returns the seat when it answers
    /// our pending request; replayed assignments from an earlier visit to
    /// the room only update the table.
    pub fn on_seat_assigned(&mut self, peer: PeerId, slot: SlotId) -> Option<SlotId> {
        self.table.claim(slot, peer);
        if peer == self.local_peer && self.awaiting_assignment {
            self.awaiting_assignment = false;
            self.local = Some(slot);
            info!(peer = %peer, slot = %slot, "Seat assigned by master");
            return Some(slot);
        }
        None
    }

    /// A member left the room without giving its seat back
    pub fn on_peer_left(
        &mut self,
        peer: PeerId,
        transport: &dyn Transport,
    ) -> Result<Option<SlotId>, TransportError> {
        let freed = self.table.release_peer(peer);
        if let Some(slot) = freed {
            if self.policy == SeatPolicy::Authoritative && transport.is_room_master() {
                self.send(transport, RpcTarget::AllBuffered, RpcCall::SetUnoccupied { slot })?;
            }
        }
        Ok(freed)
    }

    /// Give the local seat back before leaving the room
    pub fn release_local(&mut self, transport: &dyn Transport) -> Result<Option<SlotId>, TransportError> {
        let Some(slot) = self.local.take() else {
            return Ok(None);
        };
        self.table.release(slot);
        self.send(transport, RpcTarget::AllBuffered, RpcCall::SetUnoccupied { slot })?;
        Ok(Some(slot))
    }

    /// Forget everything about the room just left
    pub fn reset(&mut self) {
        self.table = SeatTable::default();
        self.local = None;
        self.awaiting_assignment = false;
    }

    fn assign(
        &mut self,
        transport: &dyn Transport,
        peer: PeerId,
        slot: SlotId,
    ) -> Result<(), TransportError> {
        self.table.claim(slot, peer);
        self.send(transport, RpcTarget::AllBuffered, RpcCall::SeatAssigned { peer, slot })
    }

    fn send(
        &mut self,
        transport: &dyn Transport,
        target: RpcTarget,
        call: RpcCall,
    ) -> Result<(), TransportError> {
        if !matches!(call, RpcCall::SetUnoccupied { .. }) {
            self.seat_broadcasts += 1;
        }
        transport.broadcast(target, call)
    }
}
