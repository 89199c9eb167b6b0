//! Error types for the console
//!
//! Transport failures live in [`crate::transport::TransportError`]; this
//! module wraps them together with the errors raised by console operations.

use crate::transport::TransportError;
use thiserror::Error;

/// Console-level error types
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The websocket URL could not be parsed
    #[error("Invalid websocket URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The URL parsed but does not use a websocket scheme
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Sending over the socket failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
