//! Transport contract, wire types and connection sequencing

pub mod lifecycle;
pub mod loopback;
pub mod protocol;
pub mod transport;

pub use lifecycle::{ConnectionLifecycle, ConnectionState};
pub use loopback::{LoopbackHub, LoopbackTransport};
pub use protocol::{Envelope, PeerId, RpcCall, RpcTarget, SlotId};
pub use transport::{Transport, TransportError, TransportEvent};
