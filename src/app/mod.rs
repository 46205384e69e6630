//! Per-peer application context

mod state;

pub use state::ClientContext;
