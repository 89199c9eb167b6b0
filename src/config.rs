//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use crate::state::{DEFAULT_HISTORY_LIMIT, DEFAULT_NOTIFICATION_LIMIT};
use std::env;
use std::time::Duration;

/// Default websocket endpoint of the backend
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Connection configuration
    pub connection: ConnectionConfig,
    /// Notification configuration
    pub notifications: NotificationConfig,
    /// In-memory list bounds
    pub limits: LimitsConfig,
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Websocket URL to connect to
    pub ws_url: String,
}

/// Notification configuration
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationConfig {
    /// How long a toast stays on screen unless the caller overrides it
    pub toast_timeout: Duration,
    /// Identical messages inside this window are dropped
    pub debounce: Duration,
}

/// Bounds on the in-memory lists
#[derive(Debug, Clone, PartialEq)]
pub struct LimitsConfig {
    /// Maximum command history entries kept
    pub history: usize,
    /// Maximum notifications kept in the feed
    pub notifications: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                ws_url: DEFAULT_WS_URL.to_string(),
            },
            notifications: NotificationConfig {
                toast_timeout: Duration::from_millis(5000),
                debounce: Duration::from_millis(5000),
            },
            limits: LimitsConfig {
                history: DEFAULT_HISTORY_LIMIT,
                notifications: DEFAULT_NOTIFICATION_LIMIT,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connection: ConnectionConfig {
                ws_url: env::var("CONSOLE_WS_URL").unwrap_or(defaults.connection.ws_url),
            },
            notifications: NotificationConfig {
                toast_timeout: env_parse("CONSOLE_TOAST_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.notifications.toast_timeout),
                debounce: env_parse("CONSOLE_NOTIFICATION_DEBOUNCE_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.notifications.debounce),
            },
            limits: LimitsConfig {
                history: env_parse("CONSOLE_HISTORY_LIMIT").unwrap_or(defaults.limits.history),
                notifications: env_parse("CONSOLE_NOTIFICATION_LIMIT")
                    .unwrap_or(defaults.limits.notifications),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
