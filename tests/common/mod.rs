#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;

use duel_peer::game::effects::{AnimationCue, Presentation, SoundCue};
use duel_peer::game::Vec3;
use duel_peer::matchmaking::SeatPolicy;
use duel_peer::net::protocol::SlotId;
use duel_peer::net::{LoopbackHub, LoopbackTransport};
use duel_peer::{ClientContext, Config, PeerSession};

/// Presentation that remembers what it was asked to show
#[derive(Default)]
pub struct RecordingPresentation {
    pub animations: Mutex<Vec<(SlotId, AnimationCue)>>,
    pub sounds: Mutex<Vec<(SlotId, SoundCue)>>,
    pub explosions: Mutex<Vec<Vec3>>,
}

impl RecordingPresentation {
    pub fn explosion_count(&self) -> usize {
        self.explosions.lock().len()
    }

    pub fn saw(&self, slot: SlotId, cue: AnimationCue) -> bool {
        self.animations.lock().contains(&(slot, cue))
    }
}

impl Presentation for RecordingPresentation {
    fn animate(&self, slot: SlotId, cue: AnimationCue) {
        self.animations.lock().push((slot, cue));
    }

    fn play_sound(&self, slot: SlotId, cue: SoundCue) {
        self.sounds.lock().push((slot, cue));
    }

    fn explosion(&self, at: Vec3) {
        self.explosions.lock().push(at);
    }
}

pub fn config(policy: SeatPolicy) -> Config {
    Config {
        seat_policy: policy,
        room_seed: Some(11),
        ..Config::default()
    }
}

pub struct Peer {
    pub session: PeerSession,
    pub presentation: Arc<RecordingPresentation>,
    /// Handle onto the same transport the session uses
    pub transport: LoopbackTransport,
}

/// A session on the hub that has already reached the lobby
pub fn connected_peer(hub: &LoopbackHub, config: Config) -> Peer {
    let presentation = Arc::new(RecordingPresentation::default());
    let transport = hub.add_peer();
    let ctx = ClientContext::with_presentation(
        config,
        Arc::new(transport.clone()),
        presentation.clone(),
    );
    let mut session = PeerSession::new(ctx);
    session.connect().unwrap();
    session.pump();
    Peer {
        session,
        presentation,
        transport,
    }
}

/// Pump every session until no events are left anywhere
pub fn settle(sessions: &mut [&mut PeerSession]) {
    loop {
        let handled: usize = sessions.iter_mut().map(|s| s.pump()).sum();
        if handled == 0 {
            break;
        }
    }
}

/// Run fixed ticks on every session, pumping after each one
pub fn run_ticks(sessions: &mut [&mut PeerSession], ticks: u32) {
    for _ in 0..ticks {
        for session in sessions.iter_mut() {
            session.fixed_tick();
        }
        settle(sessions);
    }
}

/// Two peers quick-started into the same room, one after the other
pub fn seated_pair(hub: &LoopbackHub, config: Config) -> (Peer, Peer) {
    let mut a = connected_peer(hub, config.clone());
    a.session.quick_start().unwrap();
    settle(&mut [&mut a.session]);

    let mut b = connected_peer(hub, config);
    b.session.quick_start().unwrap();
    settle(&mut [&mut a.session, &mut b.session]);
    (a, b)
}
