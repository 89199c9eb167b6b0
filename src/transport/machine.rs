//! Connection state machine
//!
//! Tracks which socket is current and the disconnected -> connecting ->
//! connected -> disconnected lifecycle. Pure bookkeeping with no I/O.

use crate::state::ConnectionState;
use crate::transport::ConnectionId;

/// Lifecycle of the single logical connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionMachine {
    state: ConnectionState,
    current: Option<ConnectionId>,
    next_id: u64,
}

impl ConnectionMachine {
    /// Create a machine in the disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Socket whose events are currently accepted
    pub fn current(&self) -> Option<ConnectionId> {
        self.current
    }

    /// Whether an event from `connection` should be handled
    pub fn is_current(&self, connection: ConnectionId) -> bool {
        self.current == Some(connection)
    }

    /// Start a new connection attempt
    ///
    /// Returns `None` while an attempt is already in flight. Otherwise the
    /// previous socket (if any) stops being current and a fresh ID is issued.
    pub fn begin_connect(&mut self) -> Option<ConnectionId> {
        if self.state == ConnectionState::Connecting {
            return None;
        }
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.current = Some(id);
        self.state = ConnectionState::Connecting;
        Some(id)
    }

    /// The current socket finished its handshake
    /// Returns true if the machine moved to connected
    pub fn opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        true
    }

    /// The current socket closed
    /// Returns the state held just before closing
    pub fn closed(&mut self) -> ConnectionState {
        let previous = self.state;
        self.state = ConnectionState::Disconnected;
        self.current = None;
        previous
    }
}
