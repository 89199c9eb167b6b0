// Dashboard data model
// Agents, command history entries, notifications and connection state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for an agent
pub type AgentId = String;

/// Connection lifecycle state
/// Moves only disconnected -> connecting -> connected -> disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket, or the last socket has closed
    #[default]
    Disconnected,
    /// A socket has been opened and the handshake is in flight
    Connecting,
    /// The socket is open and ready
    Connected,
}

impl ConnectionState {
    /// Lower-case label, as shown in the dashboard header
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// Agent status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    /// Agent checked in recently (`ALIVE`)
    Alive,
    /// Agent stopped checking in (`MIA`)
    Missing,
    /// Agent was killed by the server (`SRV-KILLED`)
    Killed,
    /// Any status string the console does not recognise
    Unknown,
}

impl AgentStatus {
    /// Classify a raw status string
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ALIVE" => AgentStatus::Alive,
            "MIA" => AgentStatus::Missing,
            "SRV-KILLED" => AgentStatus::Killed,
            _ => AgentStatus::Unknown,
        }
    }
}

/// Agent as published in `agentUpdate` frames
///
/// Every field is optional on the wire; missing fields take their default.
/// The backend emits snake_case names, camelCase is accepted as well.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Agent {
    /// Unique identifier for the agent
    pub id: AgentId,
    /// Address the agent connected from
    pub ip: String,
    /// Operating system reported by the agent
    pub os: String,
    /// Service/group the agent belongs to
    pub service: String,
    /// Raw status string (see [`AgentStatus`])
    pub status: String,
    /// Last check-in time
    #[serde(alias = "lastSeen")]
    pub last_seen: Option<DateTime<Utc>>,
    /// First check-in time
    #[serde(alias = "firstSeen")]
    pub first_seen: Option<DateTime<Utc>>,
    /// Network adapter description
    #[serde(alias = "networkAdapter")]
    pub network_adapter: String,
    /// Latest command output held by the backend
    #[serde(alias = "commandResponse")]
    pub command_response: String,
}

impl Agent {
    /// Create an agent with only an ID set
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Parsed status of the agent
    pub fn agent_status(&self) -> AgentStatus {
        AgentStatus::parse(&self.status)
    }
}

/// One executed command, as reported by a `commandResponse` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHistoryEntry {
    /// Agent the command ran on
    pub agent_id: AgentId,
    /// Command line that was sent
    pub command: String,
    /// Server-side timestamp of the response, exactly as sent
    pub timestamp: Option<Value>,
    /// Whether the command succeeded
    pub success: bool,
    /// Failure reason, when `success` is false
    pub error: Option<String>,
    /// Command output, when the backend includes it
    pub output: Option<String>,
}

impl CommandHistoryEntry {
    /// Whether two entries describe the same response
    /// Identity is the (agent, command, timestamp) triple
    pub fn same_response(&self, other: &CommandHistoryEntry) -> bool {
        self.agent_id == other.agent_id
            && self.command == other.command
            && self.timestamp == other.timestamp
    }

    /// Timestamp as a point in time, when it is an RFC 3339 string
    pub fn time(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_ref()?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Notification tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Neutral information
    #[default]
    Info,
    /// An action succeeded
    Success,
    /// Something destructive happened or needs attention
    Warning,
    /// An action or the connection failed
    Error,
}

impl NotificationKind {
    /// Lower-case name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }

    /// Capitalized name, used as the toast title
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::Info => "Info",
            NotificationKind::Success => "Success",
            NotificationKind::Warning => "Warning",
            NotificationKind::Error => "Error",
        }
    }
}

/// A user-facing notification in the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Creation time in milliseconds since the epoch
    pub id: i64,
    /// Text shown to the operator
    pub message: String,
    /// Tone of the notification
    pub kind: NotificationKind,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
