// Dashboard state management
// Connection state, agent roster, command history and notification feed

use crate::state::models::{Agent, AgentId, CommandHistoryEntry, ConnectionState, Notification};

/// Default bound on the command history
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
/// Default bound on the notification feed
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;

/// Shared dashboard state
///
/// Single mutation surface for everything the presentation layer renders.
/// Mutators are crate-private: only the transport lifecycle and the message
/// dispatcher write here. Lists are kept newest first where ordering is ours.
#[derive(Debug, Clone)]
pub struct DashboardState {
    connection_state: ConnectionState,
    agents: Vec<Agent>,
    command_history: Vec<CommandHistoryEntry>,
    notifications: Vec<Notification>,
    history_limit: usize,
    notification_limit: usize,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::with_limits(DEFAULT_HISTORY_LIMIT, DEFAULT_NOTIFICATION_LIMIT)
    }
}

impl DashboardState {
    /// Create an empty state with the default bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty state with custom list bounds
    pub fn with_limits(history_limit: usize, notification_limit: usize) -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            agents: Vec::new(),
            command_history: Vec::new(),
            notifications: Vec::new(),
            history_limit,
            notification_limit,
        }
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Agent roster, in server order
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Look up an agent by ID
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    /// Command history, newest first
    pub fn command_history(&self) -> &[CommandHistoryEntry] {
        &self.command_history
    }

    /// History entries for one agent, newest first
    pub fn history_for<'a>(
        &'a self,
        agent_id: &'a AgentId,
    ) -> impl Iterator<Item = &'a CommandHistoryEntry> + 'a {
        self.command_history
            .iter()
            .filter(move |entry| &entry.agent_id == agent_id)
    }

    /// Notification feed, newest first
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub(crate) fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
    }

    /// Replace the roster wholesale
    pub(crate) fn replace_agents(&mut self, agents: Vec<Agent>) {
        self.agents = agents;
    }

    /// Prepend a history entry unless the same response is already recorded
    /// Returns true if the entry was inserted
    pub(crate) fn record_command(&mut self, entry: CommandHistoryEntry) -> bool {
        if self
            .command_history
            .iter()
            .any(|existing| existing.same_response(&entry))
        {
            return false;
        }
        self.command_history.insert(0, entry);
        self.command_history.truncate(self.history_limit);
        true
    }

    pub(crate) fn push_notification(&mut self, notification: Notification) {
        self.notifications.insert(0, notification);
        self.notifications.truncate(self.notification_limit);
    }

    pub(crate) fn clear_notifications(&mut self) {
        self.notifications.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::NotificationKind;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn entry(agent: &str, command: &str, second: u32) -> CommandHistoryEntry {
        CommandHistoryEntry {
            agent_id: agent.to_string(),
            command: command.to_string(),
            timestamp: Some(json!(format!("2024-01-01T00:00:{:02}Z", second))),
            success: true,
            error: None,
            output: None,
        }
    }

    fn notification(id: i64) -> Notification {
        Notification {
            id,
            message: format!("n{}", id),
            kind: NotificationKind::Info,
            created_at: Utc.timestamp_millis_opt(id).unwrap(),
        }
    }

    #[test]
    fn test_state_creation() {
        let state = DashboardState::new();
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
        assert!(state.agents().is_empty());
        assert!(state.command_history().is_empty());
        assert!(state.notifications().is_empty());
    }

    #[test]
    fn test_replace_agents_does_not_accumulate() {
        let mut state = DashboardState::new();
        state.replace_agents(vec![Agent::new("a"), Agent::new("b")]);
        state.replace_agents(vec![Agent::new("c")]);

        assert_eq!(state.agents().len(), 1);
        assert_eq!(state.agents()[0].id, "c");
        assert!(state.agent("c").is_some());
        assert!(state.agent("a").is_none());
    }

    #[test]
    fn test_record_command_newest_first_and_dedup() {
        let mut state = DashboardState::new();
        assert!(state.record_command(entry("a1", "whoami", 1)));
        assert!(state.record_command(entry("a1", "hostname", 2)));
        assert!(!state.record_command(entry("a1", "whoami", 1)));

        assert_eq!(state.command_history().len(), 2);
        assert_eq!(state.command_history()[0].command, "hostname");
    }

    #[test]
    fn test_record_command_same_command_new_timestamp() {
        let mut state = DashboardState::new();
        assert!(state.record_command(entry("a1", "whoami", 1)));
        assert!(state.record_command(entry("a1", "whoami", 2)));
        assert!(state.record_command(entry("a2", "whoami", 1)));
        assert_eq!(state.command_history().len(), 3);
    }

    #[test]
    fn test_history_is_bounded_and_evicts_oldest() {
        let mut state = DashboardState::new();
        for i in 0..120 {
            state.record_command(CommandHistoryEntry {
                command: format!("cmd-{}", i),
                ..entry("a1", "", 0)
            });
        }

        assert_eq!(state.command_history().len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(state.command_history()[0].command, "cmd-119");
        assert_eq!(state.command_history()[99].command, "cmd-20");
    }

    #[test]
    fn test_history_for_filters_by_agent() {
        let mut state = DashboardState::new();
        state.record_command(entry("a1", "ls", 1));
        state.record_command(entry("a2", "ls", 2));
        state.record_command(entry("a1", "pwd", 3));

        let agent = "a1".to_string();
        let commands: Vec<_> = state
            .history_for(&agent)
            .map(|entry| entry.command.as_str())
            .collect();
        assert_eq!(commands, vec!["pwd", "ls"]);
    }

    #[test]
    fn test_notifications_are_bounded() {
        let mut state = DashboardState::with_limits(10, 3);
        for id in 1..=5 {
            state.push_notification(notification(id));
        }

        let ids: Vec<_> = state.notifications().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);

        state.clear_notifications();
        assert!(state.notifications().is_empty());
    }
}
