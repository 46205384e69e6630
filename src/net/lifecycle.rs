//! Connect, lobby, room and teardown sequencing over a [`Transport`]

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::transport::{Transport, TransportError};

/// Where this peer is in the connection sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    ConnectedToMaster,
    JoiningLobby,
    InLobby,
    JoiningRoom,
    InRoom,
    LeavingRoom,
    LeavingLobby,
    Disconnecting,
}

type ReadyCallback = Box<dyn FnMut(&str) + Send>;

/// Drives the transport through connect and teardown
pub struct ConnectionLifecycle {
    transport: Arc<dyn Transport>,
    state: ConnectionState,
    initialized: bool,
    tearing_down: bool,
    poll_interval: Duration,
    on_ready: Option<ReadyCallback>,
}

impl ConnectionLifecycle {
    pub fn new(transport: Arc<dyn Transport>, poll_interval: Duration) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            initialized: false,
            tearing_down: false,
            poll_interval,
            on_ready: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_tearing_down(&self) -> bool {
        self.tearing_down
    }

    /// Start connecting. `on_ready` runs with the region name each time the
    /// lobby has been joined. Calling this again is a no-op.
    pub fn init<F>(&mut self, on_ready: F) -> Result<(), TransportError>
    where
        F: FnMut(&str) + Send + 'static,
    {
        if self.initialized {
            debug!(peer = %self.transport.local_peer(), "Connection already initialized");
            return Ok(());
        }
        self.initialized = true;
        self.on_ready = Some(Box::new(on_ready));
        self.state = ConnectionState::Connecting;
        self.transport.connect()
    }

    /// The transport reached the master server (again)
    pub fn on_connected_to_master(&mut self) -> Result<(), TransportError> {
        if self.tearing_down {
            return Ok(());
        }
        self.state = ConnectionState::ConnectedToMaster;
        self.transport.join_lobby()?;
        self.state = if self.transport.is_in_lobby() {
            ConnectionState::InLobby
        } else {
            ConnectionState::JoiningLobby
        };

        let region = self.transport.current_region().unwrap_or_default();
        info!(peer = %self.transport.local_peer(), region = %region, "Connected to master server");
        if let Some(on_ready) = self.on_ready.as_mut() {
            on_ready(region.as_str());
        }
        Ok(())
    }

    pub fn on_joining_room(&mut self) {
        self.state = ConnectionState::JoiningRoom;
    }

    pub fn on_joined_room(&mut self) {
        self.state = ConnectionState::InRoom;
    }

    /// Leave room, lobby and server in order, waiting for each step to be
    /// confirmed. There is no timeout: a transport that never confirms keeps
    /// this pending forever.
    pub async fn teardown(&mut self) -> Result<(), TransportError> {
        self.tearing_down = true;
        let transport = self.transport.clone();

        if transport.is_in_room() {
            self.state = ConnectionState::LeavingRoom;
            transport.leave_room()?;
            while transport.is_in_room() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        if transport.is_in_lobby() {
            self.state = ConnectionState::LeavingLobby;
            transport.leave_lobby()?;
            while transport.is_in_lobby() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        if transport.is_connected() {
            self.state = ConnectionState::Disconnecting;
            transport.disconnect()?;
            while transport.is_connected() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        self.state = ConnectionState::Disconnected;
        self.initialized = false;
        self.tearing_down = false;
        info!(peer = %transport.local_peer(), "Disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::loopback::{LoopbackHub, LoopbackTransport};
    use crate::net::protocol::RoomOptions;
    use crate::net::transport::TransportEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const POLL: Duration = Duration::from_millis(50);

    fn lifecycle(hub: &LoopbackHub) -> (LoopbackTransport, ConnectionLifecycle) {
        let transport = hub.add_peer();
        let lifecycle = ConnectionLifecycle::new(Arc::new(transport.clone()), POLL);
        (transport, lifecycle)
    }

    #[test]
    fn init_is_idempotent_and_reports_the_region() {
        let hub = LoopbackHub::new("asia");
        let (transport, mut lifecycle) = lifecycle(&hub);
        let regions = Arc::new(Mutex::new(Vec::new()));

        let seen = regions.clone();
        lifecycle
            .init(move |region| seen.lock().unwrap().push(region.to_string()))
            .unwrap();
        lifecycle.init(|_| panic!("second callback must not be installed")).unwrap();
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);

        let mut connected = 0;
        while let Some(event) = transport.poll_event() {
            if event == TransportEvent::ConnectedToMaster {
                connected += 1;
                lifecycle.on_connected_to_master().unwrap();
            }
        }
        assert_eq!(connected, 1);
        assert_eq!(lifecycle.state(), ConnectionState::InLobby);
        assert!(transport.is_in_lobby());
        assert_eq!(*regions.lock().unwrap(), vec!["asia".to_string()]);
    }

    #[test]
    fn teardown_completes_against_a_confirming_transport() {
        let hub = LoopbackHub::new("eu");
        let (transport, mut lifecycle) = lifecycle(&hub);
        let ready = Arc::new(AtomicUsize::new(0));
        let counter = ready.clone();
        lifecycle
            .init(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        lifecycle.on_connected_to_master().unwrap();
        transport.create_room("Room 5", RoomOptions::default()).unwrap();
        lifecycle.on_joined_room();

        tokio_test::block_on(lifecycle.teardown()).unwrap();

        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
        assert!(!transport.is_in_room());
        assert!(!transport.is_in_lobby());
        assert!(!transport.is_connected());
        assert_eq!(ready.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_hangs_while_the_leave_is_never_confirmed() {
        let hub = LoopbackHub::new("eu");
        let (transport, mut lifecycle) = lifecycle(&hub);
        lifecycle.init(|_| {}).unwrap();
        lifecycle.on_connected_to_master().unwrap();
        transport.create_room("Room 5", RoomOptions::default()).unwrap();
        lifecycle.on_joined_room();
        hub.stall_leave_room(true);

        let outcome = tokio::time::timeout(Duration::from_secs(600), lifecycle.teardown()).await;
        assert!(outcome.is_err());
        assert_eq!(lifecycle.state(), ConnectionState::LeavingRoom);
        assert!(transport.is_in_room());
    }

    #[test]
    fn reconnect_events_are_ignored_while_tearing_down() {
        let hub = LoopbackHub::new("eu");
        let (_transport, mut lifecycle) = lifecycle(&hub);
        lifecycle.init(|_| {}).unwrap();
        lifecycle.tearing_down = true;
        lifecycle.state = ConnectionState::LeavingRoom;
        lifecycle.on_connected_to_master().unwrap();
        assert_eq!(lifecycle.state(), ConnectionState::LeavingRoom);
    }
}
