//! Agent Console Library
//!
//! Client-side core of the agent management dashboard: one websocket
//! connection to the backend, inbound message dispatch, and the shared
//! state (connection status, agent roster, command history, notifications)
//! that the presentation layer renders.
//! The headless binary is in `src/main.rs`.

pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod notifications;
pub mod protocol;
/// Dashboard state management
///
/// Handles the agent roster, command history and notification feed.
pub mod state;
pub mod transport;

pub use console::Console;
pub use error::ConsoleError;
