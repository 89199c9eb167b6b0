// State management module
// Handles connection state, agent roster, command history and notifications

pub mod app_state;
pub mod models;

pub use app_state::{DashboardState, DEFAULT_HISTORY_LIMIT, DEFAULT_NOTIFICATION_LIMIT};
pub use models::{
    Agent, AgentId, AgentStatus, CommandHistoryEntry, ConnectionState, Notification,
    NotificationKind,
};
