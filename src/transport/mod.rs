//! Socket transport
//!
//! The console never touches a socket library directly. It asks a
//! [`Connector`] for a [`Socket`] and receives lifecycle events tagged with
//! the [`ConnectionId`] it handed out, so events from a discarded socket can
//! be told apart from the current one.

pub mod machine;
pub mod ws;

pub use machine::ConnectionMachine;
pub use ws::{WsConnector, WsEvents};

use thiserror::Error;
use url::Url;

/// Identifies one opened socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Socket readiness, mirroring the websocket `readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in flight
    Connecting = 0,
    /// Ready to send
    Open = 1,
    /// Close requested, not yet closed
    Closing = 2,
    /// Closed or failed
    Closed = 3,
}

impl ReadyState {
    /// Inverse of `as u8`, anything unknown reads as closed
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Lifecycle event raised by a socket
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// The handshake completed
    Open,
    /// A text frame arrived
    Message(String),
    /// A transport-level failure; a `Close` follows
    Error(String),
    /// The socket is closed; no further events follow
    Close,
}

/// A socket event tagged with the socket that raised it
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    /// Socket that raised the event
    pub connection: ConnectionId,
    /// What happened
    pub event: SocketEvent,
}

/// Errors raised when sending
#[derive(Error, Debug)]
pub enum TransportError {
    /// There is no socket, or it is not open
    #[error("Socket is not connected")]
    NotConnected,

    /// The message could not be serialized
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The socket task has gone away
    #[error("Socket channel closed")]
    ChannelClosed,
}

/// One open (or opening) socket
pub trait Socket: Send {
    /// Current readiness
    fn ready_state(&self) -> ReadyState;

    /// Queue a text frame for sending
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Start closing; a `Close` event follows
    fn close(&mut self);
}

/// Opens sockets
pub trait Connector: Send {
    /// Open a socket to `url`
    ///
    /// Events raised by the socket must be tagged with `connection`.
    fn open(&mut self, connection: ConnectionId, url: &Url) -> Box<dyn Socket>;
}
