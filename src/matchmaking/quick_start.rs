//! Quick start: join any open room, otherwise create one under a random name

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::net::protocol::RoomOptions;
use crate::net::transport::{Transport, TransportError};

/// Room names are drawn from "Room 0" .. "Room 19"
pub const ROOM_NAME_RANGE: u32 = 20;

/// Join/create retry loop. Failures are retried immediately, without a cap.
pub struct QuickStart {
    rng: ChaCha8Rng,
    attempts: u32,
}

impl QuickStart {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random::<u64>()),
        };
        Self { rng, attempts: 0 }
    }

    /// Room creations attempted since the last `start`
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn start(&mut self, transport: &dyn Transport) -> Result<(), TransportError> {
        self.attempts = 0;
        info!(peer = %transport.local_peer(), "Quick start: joining a random room");
        transport.join_random_room()
    }

    pub fn on_join_random_failed(
        &mut self,
        transport: &dyn Transport,
        code: i16,
        message: &str,
    ) -> Result<String, TransportError> {
        info!(code, reason = message, "No room to join, creating one");
        self.create_random_room(transport)
    }

    pub fn on_create_room_failed(
        &mut self,
        transport: &dyn Transport,
        code: i16,
        message: &str,
    ) -> Result<String, TransportError> {
        warn!(code, reason = message, attempts = self.attempts, "Room creation failed, retrying");
        self.create_random_room(transport)
    }

    pub fn random_room_name(&mut self) -> String {
        format!("Room {}", self.rng.gen_range(0..ROOM_NAME_RANGE))
    }

    fn create_random_room(&mut self, transport: &dyn Transport) -> Result<String, TransportError> {
        self.attempts += 1;
        let name = self.random_room_name();
        transport.create_room(&name, RoomOptions::default())?;
        Ok(name)
    }
}
