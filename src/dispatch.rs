//! Inbound message dispatch
//!
//! Every text frame from the backend passes through [`dispatch_frame`]:
//! built-in handling first (roster, history, notifications), then listeners
//! registered for the frame's exact type, then listeners registered for
//! [`ListenerTopic::All`]. Each group runs in registration order.

use crate::notifications::NotificationCenter;
use crate::protocol::{types, ActionResponse, InboundFrame, ServerError};
use crate::state::{DashboardState, NotificationKind};
use tracing::{debug, warn};

/// What a listener subscribes to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenerTopic {
    /// Frames whose `type` equals this string exactly
    Type(String),
    /// Every frame
    All,
}

impl ListenerTopic {
    /// Subscribe to one frame type
    ///
    /// `"all"` is the name of the every-frame topic and maps to
    /// [`ListenerTopic::All`].
    pub fn of(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        if kind == "all" {
            ListenerTopic::All
        } else {
            ListenerTopic::Type(kind)
        }
    }
}

/// Token returned by [`ListenerRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Callback invoked with each matching frame
///
/// An `Err` is logged and does not stop the remaining listeners.
pub type Listener = Box<dyn FnMut(&InboundFrame) -> anyhow::Result<()> + Send>;

struct Registration {
    handle: ListenerHandle,
    topic: ListenerTopic,
    listener: Listener,
}

/// Ordered observer registry keyed by frame type
#[derive(Default)]
pub struct ListenerRegistry {
    registrations: Vec<Registration>,
    next_handle: u64,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn add(&mut self, topic: ListenerTopic, listener: Listener) -> ListenerHandle {
        self.next_handle += 1;
        let handle = ListenerHandle(self.next_handle);
        self.registrations.push(Registration {
            handle,
            topic,
            listener,
        });
        handle
    }

    /// Remove exactly the registration behind `handle`
    /// Returns false if it was already removed
    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        match self.registrations.iter().position(|r| r.handle == handle) {
            Some(index) => {
                self.registrations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Invoke type listeners, then `All` listeners
    /// Frames without a string `type` only reach `All` listeners
    pub fn notify(&mut self, frame: &InboundFrame) {
        let exact = frame.kind().map(|kind| ListenerTopic::Type(kind.to_string()));
        for topic in exact.iter().chain([&ListenerTopic::All]) {
            for registration in self.registrations.iter_mut().filter(|r| &r.topic == topic) {
                if let Err(e) = (registration.listener)(frame) {
                    warn!(
                        frame_type = ?frame.kind(),
                        listener = registration.handle.0,
                        "Listener failed: {:#}",
                        e
                    );
                }
            }
        }
    }
}

/// Route one parsed frame
///
/// # Arguments
/// * `frame` - Parsed inbound frame
/// * `state` - Dashboard state to update
/// * `notifier` - Notification center for operator alerts
/// * `listeners` - Registered listeners, invoked after built-in handling
pub fn dispatch_frame(
    frame: &InboundFrame,
    state: &mut DashboardState,
    notifier: &mut NotificationCenter,
    listeners: &mut ListenerRegistry,
) {
    match frame.kind() {
        Some(types::AGENT_UPDATE) => state.replace_agents(frame.agents()),
        Some(types::COMMAND_RESPONSE) => {
            let response = ActionResponse::from_frame(frame);
            state.record_command(response.to_history_entry());
            let message = if response.success {
                format!("Command executed successfully on {}", response.agent_id)
            } else {
                format!(
                    "Command failed on {}: {}",
                    response.agent_id,
                    response.error_text()
                )
            };
            notify_result(
                notifier,
                state,
                response.success,
                NotificationKind::Success,
                &message,
            );
        }
        Some(types::PING_RESPONSE) => {
            let response = ActionResponse::from_frame(frame);
            let message = if response.success {
                format!("Ping sent to {}", response.agent_id)
            } else {
                format!(
                    "Ping failed for {}: {}",
                    response.agent_id,
                    response.error_text()
                )
            };
            notify_result(
                notifier,
                state,
                response.success,
                NotificationKind::Success,
                &message,
            );
        }
        Some(types::KILL_RESPONSE) => {
            let response = ActionResponse::from_frame(frame);
            let message = if response.success {
                format!("Kill command sent to {}", response.agent_id)
            } else {
                format!(
                    "Kill command failed for {}: {}",
                    response.agent_id,
                    response.error_text()
                )
            };
            notify_result(
                notifier,
                state,
                response.success,
                NotificationKind::Warning,
                &message,
            );
        }
        Some(types::GROUP_RESPONSE) => {
            let response = ActionResponse::from_frame(frame);
            let message = if response.success {
                format!(
                    "Agent {} assigned to group '{}'",
                    response.agent_id,
                    response.group_name.as_deref().unwrap_or_default()
                )
            } else {
                format!(
                    "Failed to assign agent {} to group: {}",
                    response.agent_id,
                    response.error_text()
                )
            };
            notify_result(
                notifier,
                state,
                response.success,
                NotificationKind::Success,
                &message,
            );
        }
        Some(types::ERROR) => {
            let error = ServerError::from_frame(frame);
            notifier.add(state, &error.message, NotificationKind::Error, None);
        }
        Some(other) => debug!("Unknown message type: {}", other),
        None => debug!("Frame without a type: {}", frame.body()),
    }

    listeners.notify(frame);
}

fn notify_result(
    notifier: &mut NotificationCenter,
    state: &mut DashboardState,
    success: bool,
    success_kind: NotificationKind,
    message: &str,
) {
    let kind = if success {
        success_kind
    } else {
        NotificationKind::Error
    };
    notifier.add(state, message, kind, None);
}
