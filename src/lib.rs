//! Duel peer - replication core for a two-seat real-time match
//!
//! Two peers share a room over a broadcast-only transport with no
//! dedicated server. This crate covers:
//! - Connection lifecycle and quick-start room matchmaking
//! - Seat arbitration between the two peers
//! - Owner-authoritative player state with invincibility windows
//! - Deterministic, per-peer projectile simulation
//! - An in-memory loopback transport for running peers in one process

pub mod app;
pub mod chat;
pub mod config;
pub mod game;
pub mod matchmaking;
pub mod net;
pub mod util;

pub use app::ClientContext;
pub use config::Config;
pub use game::{PeerSession, SessionCommand, SessionError};
