//! Room matchmaking and seat arbitration

pub mod quick_start;
pub mod seats;

pub use quick_start::QuickStart;
pub use seats::{SeatDecision, SeatPolicy, SlotArbitrator};
