//! Per-peer match session
//!
//! A `PeerSession` owns everything one peer knows about the match: its
//! connection lifecycle, seat state, the player it owns, its view of the
//! other player and the projectiles in flight. It is driven by a fixed
//! simulation tick, a transport pump and a command channel.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app::ClientContext;
use crate::chat::{ChatChannel, ChatError};
use crate::matchmaking::{QuickStart, SeatDecision, SlotArbitrator};
use crate::net::lifecycle::{ConnectionLifecycle, ConnectionState};
use crate::net::protocol::{Envelope, PeerId, RpcCall, RpcTarget, SlotId};
use crate::net::transport::{Transport, TransportError, TransportEvent};
use crate::util::time::{tick_delta, tick_duration};

use super::action::{Action, ActionRejected, ActionTimings};
use super::effects::{AnimationCue, SoundCue};
use super::player::{HpApplied, HpPush, PlayerReplica};
use super::projectile::{Projectile, BULLET};
use super::{spawn_point, Vec3};

/// Requests fed to a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    QuickStart,
    Jump,
    Duck,
    Fire,
    Chat(String),
    Logout,
    /// Tear the connection down and stop the session
    Exit,
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Action(#[from] ActionRejected),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Not in a match")]
    NotInMatch,
}

pub struct PeerSession {
    ctx: ClientContext,
    peer: PeerId,
    timings: ActionTimings,
    lifecycle: ConnectionLifecycle,
    quick_start: QuickStart,
    seats: SlotArbitrator,
    chat: ChatChannel,
    local: Option<PlayerReplica>,
    remotes: HashMap<PeerId, PlayerReplica>,
    projectiles: Vec<Projectile>,
    tick: u64,
    joined_rooms: u32,
    synchronized_at: Option<DateTime<Utc>>,
}

impl PeerSession {
    pub fn new(ctx: ClientContext) -> Self {
        let config = ctx.config.clone();
        let peer = ctx.transport.local_peer();

        Self {
            peer,
            timings: ActionTimings::new(config.animator_speed),
            lifecycle: ConnectionLifecycle::new(ctx.transport.clone(), config.teardown_poll),
            quick_start: QuickStart::new(config.room_seed),
            seats: SlotArbitrator::new(config.seat_policy, peer),
            chat: ChatChannel::new(config.nickname.clone(), config.chat_rate_limit),
            local: None,
            remotes: HashMap::new(),
            projectiles: Vec::new(),
            tick: 0,
            joined_rooms: 0,
            synchronized_at: None,
            ctx,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer
    }

    pub fn local(&self) -> Option<&PlayerReplica> {
        self.local.as_ref()
    }

    pub fn local_slot(&self) -> Option<SlotId> {
        self.seats.local_slot()
    }

    pub fn remote(&self, peer: PeerId) -> Option<&PlayerReplica> {
        self.remotes.get(&peer)
    }

    pub fn remotes(&self) -> impl Iterator<Item = &PlayerReplica> {
        self.remotes.values()
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn seats(&self) -> &SlotArbitrator {
        &self.seats
    }

    pub fn chat(&self) -> &ChatChannel {
        &self.chat
    }

    pub fn timings(&self) -> &ActionTimings {
        &self.timings
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Number of rooms joined so far
    pub fn joined_rooms(&self) -> u32 {
        self.joined_rooms
    }

    pub fn synchronized_at(&self) -> Option<DateTime<Utc>> {
        self.synchronized_at
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds
    pub fn now(&self) -> f64 {
        self.tick as f64 * tick_delta(self.ctx.config.fixed_tps)
    }

    /// Whether this peer owns (and alone writes) the replica
    pub fn is_local_owner(&self, replica: &PlayerReplica) -> bool {
        replica.owner() == self.ctx.transport.local_peer()
    }

    fn transport(&self) -> &dyn Transport {
        self.ctx.transport.as_ref()
    }

    pub fn connect(&mut self) -> Result<(), SessionError> {
        let peer = self.peer;
        self.lifecycle.init(move |region| {
            info!(peer = %peer, region = %region, "Lobby joined, ready for quick start");
        })?;
        Ok(())
    }

    pub fn quick_start(&mut self) -> Result<(), SessionError> {
        self.lifecycle.on_joining_room();
        self.quick_start.start(self.ctx.transport.as_ref())?;
        Ok(())
    }

    /// Apply one command
    pub fn execute(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        match command {
            SessionCommand::QuickStart => self.quick_start(),
            SessionCommand::Jump => self.jump(),
            SessionCommand::Duck => self.duck(),
            SessionCommand::Fire => self.fire(),
            SessionCommand::Chat(text) => self.send_chat(&text),
            SessionCommand::Logout => self.logout(),
            SessionCommand::Exit => Ok(()),
        }
    }

    /// Drain and handle every pending transport event
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.ctx.transport.poll_event() {
            handled += 1;
            if let Err(e) = self.handle_event(event) {
                warn!(peer = %self.peer, error = %e, "Failed to handle transport event");
            }
        }
        handled
    }

    pub fn handle_event(&mut self, event: TransportEvent) -> Result<(), SessionError> {
        match event {
            TransportEvent::ConnectedToMaster => {
                self.lifecycle.on_connected_to_master()?;
            }
            TransportEvent::JoinRandomFailed { code, message } => {
                self.quick_start
                    .on_join_random_failed(self.ctx.transport.as_ref(), code, &message)?;
            }
            TransportEvent::CreateRoomFailed { code, message } => {
                self.quick_start
                    .on_create_room_failed(self.ctx.transport.as_ref(), code, &message)?;
            }
            TransportEvent::JoinedRoom { room } => {
                self.on_joined_room(&room)?;
            }
            TransportEvent::PeerLeft { peer } => {
                self.remotes.remove(&peer);
                self.chat.notice(format!("{} left the chat", peer));
                let freed = self.seats.on_peer_left(peer, self.ctx.transport.as_ref())?;
                info!(peer = %self.peer, left = %peer, seat = ?freed, "Peer left the room");
            }
            TransportEvent::Rpc(envelope) => self.handle_rpc(envelope)?,
        }
        Ok(())
    }

    fn on_joined_room(&mut self, room: &str) -> Result<(), SessionError> {
        self.lifecycle.on_joined_room();
        self.joined_rooms += 1;
        info!(
            peer = %self.peer,
            room = %room,
            is_master = self.transport().is_room_master(),
            "Joined room"
        );

        self.chat.notice(format!("Entered to Channel ({})", room));
        self.broadcast(RpcTarget::AllBuffered, RpcCall::DisplaySyncTime)?;
        self.mark_synchronized();

        match self.seats.on_joined_room(self.ctx.transport.as_ref())? {
            SeatDecision::Assigned(slot) => self.spawn_local(slot)?,
            SeatDecision::Pending => {}
        }
        Ok(())
    }

    fn spawn_local(&mut self, slot: SlotId) -> Result<(), SessionError> {
        let position = spawn_point(slot);
        self.local = Some(PlayerReplica::new_local(self.peer, slot, position));
        self.broadcast(RpcTarget::AllBuffered, RpcCall::Instantiate { slot, position })?;
        info!(peer = %self.peer, slot = %slot, "Local player spawned");
        Ok(())
    }

    fn mark_synchronized(&mut self) {
        let stamp = Utc::now();
        self.synchronized_at = Some(stamp);
        debug!(peer = %self.peer, at = %stamp.format("%H:%M:%S%.3f"), "Sync time");
    }

    /// Run a call broadcast by another peer
    pub fn handle_rpc(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        let Envelope { sender, call } = envelope;
        let now = self.now();
        debug!(peer = %self.peer, from = %sender, call = call.name(), "Call received");

        match call {
            RpcCall::DisplaySyncTime => {
                // Every member sends this once on joining
                self.chat.notice(format!("{} entered the chat", sender));
                self.mark_synchronized();
            }
            RpcCall::SetOccupied { slot } => self.seats.on_set_occupied(sender, slot),
            RpcCall::SetUnoccupied { slot } => self.seats.on_set_unoccupied(slot),
            RpcCall::RequestSeat => {
                self.seats.on_request_seat(sender, self.ctx.transport.as_ref())?;
            }
            RpcCall::SeatAssigned { peer, slot } => {
                if let Some(slot) = self.seats.on_seat_assigned(peer, slot) {
                    self.spawn_local(slot)?;
                }
            }
            RpcCall::Instantiate { slot, position } => {
                self.remotes
                    .insert(sender, PlayerReplica::new_remote(sender, slot, position));
                // The new view starts at full hp
                if let Some(player) = self.local.as_mut() {
                    player.resend_hp();
                }
                debug!(peer = %self.peer, owner = %sender, slot = %slot, "Remote player spawned");
            }
            RpcCall::SyncHp { hp, seq } => self.apply_remote_hp(sender, HpPush { hp, seq }),
            RpcCall::Jump { slot } => self.mirror(sender, slot, Action::Jump, now),
            RpcCall::Duck { slot } => self.mirror(sender, slot, Action::Duck, now),
            RpcCall::Fire { slot, spawn_time } => {
                self.ctx.presentation.animate(slot, AnimationCue::Fire);
                self.ctx.presentation.play_sound(slot, SoundCue::Fire);
                let shooter = self.shooter_position(sender, slot);
                self.spawn_remote_projectile(slot, shooter, spawn_time);
            }
            RpcCall::Chat { from, text } => self.chat.receive(from, text),
        }
        Ok(())
    }

    fn mirror(&mut self, sender: PeerId, slot: SlotId, action: Action, now: f64) {
        if let Some(replica) = self.remotes.get_mut(&sender) {
            replica.mirror_action(action, now, &self.timings);
        }
        let (animation, sound) = match action {
            Action::Jump => (AnimationCue::Jump, SoundCue::Jump),
            Action::Duck => (AnimationCue::Duck, SoundCue::Duck),
            Action::Fire => (AnimationCue::Fire, SoundCue::Fire),
        };
        self.ctx.presentation.animate(slot, animation);
        self.ctx.presentation.play_sound(slot, sound);
    }

    fn apply_remote_hp(&mut self, sender: PeerId, push: HpPush) {
        let Some(replica) = self.remotes.get_mut(&sender) else {
            debug!(peer = %self.peer, from = %sender, "hp for unknown player dropped");
            return;
        };
        let before = replica.hp();
        match replica.apply_hp_push(push) {
            HpApplied::Stale => {
                debug!(peer = %self.peer, from = %sender, seq = push.seq, "Stale hp push dropped");
            }
            HpApplied::Applied => {
                if replica.hp() < before {
                    self.ctx
                        .presentation
                        .animate(replica.slot(), AnimationCue::Damaged);
                }
            }
            HpApplied::Killed => {
                info!(peer = %self.peer, owner = %sender, "Remote player killed");
                self.ctx
                    .presentation
                    .animate(replica.slot(), AnimationCue::Killed);
            }
        }
    }

    fn shooter_position(&self, sender: PeerId, slot: SlotId) -> Vec3 {
        self.remotes
            .get(&sender)
            .map(|replica| replica.position())
            .unwrap_or_else(|| spawn_point(slot))
    }

    fn spawn_remote_projectile(&mut self, slot: SlotId, shooter: Vec3, spawn_time: f64) {
        let tps = self.ctx.config.fixed_tps;
        let mut projectile = Projectile::spawn(slot, shooter, spawn_time, &BULLET, tps);
        let (from, to) = projectile.catch_up(self.transport().network_time(), tps);
        if projectile.is_expired() {
            return;
        }
        if from != to && self.resolve_hit(&projectile, from, to, self.now()) {
            return;
        }
        self.projectiles.push(projectile);
    }

    pub fn jump(&mut self) -> Result<(), SessionError> {
        let slot = self.begin_local_action(Action::Jump)?;
        self.broadcast(RpcTarget::All, RpcCall::Jump { slot })?;
        self.ctx.presentation.animate(slot, AnimationCue::Jump);
        self.ctx.presentation.play_sound(slot, SoundCue::Jump);
        Ok(())
    }

    pub fn duck(&mut self) -> Result<(), SessionError> {
        let slot = self.begin_local_action(Action::Duck)?;
        self.broadcast(RpcTarget::All, RpcCall::Duck { slot })?;
        self.ctx.presentation.animate(slot, AnimationCue::Duck);
        self.ctx.presentation.play_sound(slot, SoundCue::Duck);
        Ok(())
    }

    pub fn fire(&mut self) -> Result<(), SessionError> {
        let slot = self.begin_local_action(Action::Fire)?;
        let spawn_time = self.transport().network_time();
        self.broadcast(RpcTarget::All, RpcCall::Fire { slot, spawn_time })?;

        self.ctx.presentation.animate(slot, AnimationCue::Fire);
        self.ctx.presentation.play_sound(slot, SoundCue::Fire);
        let shooter = self
            .local
            .as_ref()
            .map(|player| player.position())
            .unwrap_or_else(|| spawn_point(slot));
        let projectile = Projectile::spawn(
            slot,
            shooter,
            spawn_time,
            &BULLET,
            self.ctx.config.fixed_tps,
        );
        self.projectiles.push(projectile);
        Ok(())
    }

    fn begin_local_action(&mut self, action: Action) -> Result<SlotId, SessionError> {
        let now = self.now();
        let player = self.local.as_mut().ok_or(SessionError::NotInMatch)?;
        player.begin_action(action, now, &self.timings)?;
        Ok(player.slot())
    }

    pub fn send_chat(&mut self, text: &str) -> Result<(), SessionError> {
        self.chat.send(text, self.ctx.transport.as_ref())?;
        Ok(())
    }

    /// One fixed simulation step
    pub fn fixed_tick(&mut self) {
        self.tick += 1;
        let now = self.now();

        if let Some(player) = self.local.as_mut() {
            player.tick(now);
        }
        for replica in self.remotes.values_mut() {
            replica.tick(now);
        }

        let mut projectiles = std::mem::take(&mut self.projectiles);
        projectiles.retain_mut(|projectile| match projectile.update() {
            Some((from, to)) => !self.resolve_hit(projectile, from, to, now),
            None => false,
        });
        self.projectiles = projectiles;

        if let Err(e) = self.push_hp() {
            warn!(peer = %self.peer, error = %e, "Failed to push hp");
        }
    }

    /// Resolve a flown segment against every player. Returns true when the
    /// projectile struck someone and must be removed.
    fn resolve_hit(&mut self, projectile: &Projectile, from: Vec3, to: Vec3, now: f64) -> bool {
        let struck = |replica: &PlayerReplica| {
            replica.slot() != projectile.owner_slot
                && !replica.has_killed()
                && projectile.check_hit(from, to, &replica.hitbox())
        };

        let local_hit = self.local.as_ref().is_some_and(struck);
        let remote_hit = self.remotes.values().any(struck);
        if !local_hit && !remote_hit {
            return false;
        }

        self.ctx.presentation.explosion(to);
        if local_hit {
            self.damage_local(projectile.damage, now);
        }
        true
    }

    fn damage_local(&mut self, amount: i32, now: f64) {
        let floor = self.ctx.config.hp_floor;
        let Some(player) = self.local.as_mut() else {
            return;
        };
        if !player.got_damaged(amount, now, &self.timings, floor) {
            debug!(peer = %self.peer, "Hit absorbed while invincible");
            return;
        }

        let slot = player.slot();
        info!(peer = %self.peer, slot = %slot, hp = player.hp(), "Player damaged");
        self.ctx.presentation.animate(slot, AnimationCue::Damaged);
        self.ctx.presentation.play_sound(slot, SoundCue::Hurt);

        if player.hp() <= 0 {
            player.kill();
            info!(peer = %self.peer, slot = %slot, "Player killed");
            self.ctx.presentation.animate(slot, AnimationCue::Killed);
        }
    }

    fn push_hp(&mut self) -> Result<(), SessionError> {
        if !self.transport().is_in_room() {
            return Ok(());
        }
        let policy = self.ctx.config.hp_replication;
        let Some(push) = self.local.as_mut().and_then(|p| p.next_hp_push(policy)) else {
            return Ok(());
        };
        self.broadcast(
            RpcTarget::All,
            RpcCall::SyncHp {
                hp: push.hp,
                seq: push.seq,
            },
        )
    }

    /// Give the seat back, leave the room and drop all match state
    pub fn logout(&mut self) -> Result<(), SessionError> {
        if !self.transport().is_in_room() {
            return Err(SessionError::NotInMatch);
        }
        let released = self.seats.release_local(self.ctx.transport.as_ref())?;
        self.transport().leave_room()?;

        self.local = None;
        self.remotes.clear();
        self.projectiles.clear();
        self.chat.clear();
        self.seats.reset();
        self.synchronized_at = None;
        info!(peer = %self.peer, seat = ?released, "Logged out");
        Ok(())
    }

    pub fn status_text(&self) -> String {
        let transport = self.transport();
        let Some(region) = transport.current_region() else {
            return "Connecting...".to_string();
        };
        let mut text = format!("We are now connected to the {} server!", region);
        if let Some(room) = transport.current_room() {
            text.push_str(&format!("\nSuccessfully joined by QuickStart, {}", room));
        }
        text
    }

    fn broadcast(&self, target: RpcTarget, call: RpcCall) -> Result<(), SessionError> {
        self.transport().broadcast(target, call)?;
        Ok(())
    }

    /// Drive the session until `Exit` arrives or the channel closes, then
    /// tear the connection down
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<(), SessionError> {
        info!(peer = %self.peer, "Session started");
        self.connect()?;

        let mut fixed = interval(tick_duration(self.ctx.config.fixed_tps));
        fixed.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut status = interval(self.ctx.config.status_poll);

        loop {
            tokio::select! {
                _ = fixed.tick() => {
                    self.pump();
                    self.fixed_tick();
                }
                _ = status.tick() => {
                    let text = self.status_text();
                    self.ctx.presentation.status(&text);
                }
                command = commands.recv() => match command {
                    Some(SessionCommand::Exit) | None => break,
                    Some(command) => {
                        if let Err(e) = self.execute(command.clone()) {
                            warn!(peer = %self.peer, command = ?command, error = %e, "Command failed");
                        }
                    }
                },
            }
        }

        if self.transport().is_in_room() {
            if let Err(e) = self.logout() {
                warn!(peer = %self.peer, error = %e, "Logout before teardown failed");
            }
        }
        self.lifecycle.teardown().await?;
        info!(peer = %self.peer, ticks = self.tick, "Session finished");
        Ok(())
    }
}
