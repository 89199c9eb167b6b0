//! End-to-end tests for the websocket transport against a local axum server

use agent_console::config::Config;
use agent_console::dispatch::ListenerTopic;
use agent_console::notifications::NullToastSink;
use agent_console::protocol::InboundFrame;
use agent_console::state::{ConnectionState, NotificationKind};
use agent_console::transport::{WsConnector, WsEvents};
use agent_console::Console;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn backend(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(handle_backend)
}

// Answers requests the way the agent server does
async fn handle_backend(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let request: Value = serde_json::from_str(&text).unwrap_or_default();
        let agent_id = request["agentId"].clone();
        let replies = match request["type"].as_str() {
            Some("getAgents") => vec![json!({
                "type": "agentUpdate",
                "agents": [
                    {"id": "a1", "ip": "10.0.0.5", "os": "windows", "status": "ALIVE",
                     "last_seen": "2024-05-01T10:00:00Z", "first_seen": "2024-05-01T09:00:00Z"},
                    {"id": "a2", "ip": "10.0.0.6", "os": "linux", "status": "MIA"},
                ],
            })],
            Some("executeCommand") => vec![json!({
                "type": "commandResponse",
                "agentId": agent_id,
                "command": request["command"],
                "timestamp": "2024-05-01T10:00:01Z",
                "success": true,
                "output": "nt authority\\system",
            })],
            Some("pingAgent") => vec![
                Value::String("this is not a frame".to_string()),
                json!({"type": "pingResponse", "agentId": agent_id, "success": true}),
            ],
            _ => vec![json!({"type": "error", "message": "Unknown message type"})],
        };
        for reply in replies {
            let text = match reply {
                Value::String(raw) => raw,
                other => other.to_string(),
            };
            if socket.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
    }
}

async fn hang_up(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        let _ = socket.send(Message::Close(None)).await;
    })
}

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/ws", get(backend))
        .route("/hangup", get(hang_up));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{}", addr)
}

fn console() -> (Console, WsEvents) {
    let (connector, events) = WsConnector::new();
    let console = Console::new(&Config::default(), Box::new(connector))
        .with_toast_sink(Box::new(NullToastSink));
    (console, events)
}

/// Handle events until `done` holds, failing after a few seconds
async fn pump_until(console: &mut Console, events: &mut WsEvents, done: impl Fn(&Console) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(console) {
            assert!(console.process_next(events).await, "event channel closed");
        }
    })
    .await
    .expect("timed out waiting for console state");
}

fn messages(console: &Console) -> Vec<String> {
    console
        .notifications()
        .iter()
        .map(|n| n.message.clone())
        .collect()
}

#[tokio::test]
async fn test_connect_primes_roster() {
    let base = start_server().await;
    let (mut console, mut events) = console();

    console.connect(&format!("{}/ws", base)).unwrap();
    assert_eq!(console.connection_state(), ConnectionState::Connecting);

    pump_until(&mut console, &mut events, |c| !c.agents().is_empty()).await;

    assert_eq!(console.connection_state(), ConnectionState::Connected);
    let ids: Vec<_> = console.agents().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
    assert!(console.agents()[0].last_seen.is_some());
    assert_eq!(messages(&console), vec!["Connected to server"]);
}

#[tokio::test]
async fn test_actions_round_trip() {
    let base = start_server().await;
    let (mut console, mut events) = console();
    console.connect(&format!("{}/ws", base)).unwrap();
    pump_until(&mut console, &mut events, |c| !c.agents().is_empty()).await;

    let frames = Arc::new(Mutex::new(Vec::new()));
    let seen = frames.clone();
    console.add_listener(
        ListenerTopic::All,
        Box::new(move |frame: &InboundFrame| -> anyhow::Result<()> {
            seen.lock().unwrap().push(frame.kind().unwrap_or_default().to_string());
            Ok(())
        }),
    );

    assert!(console.execute_command("a1", "whoami"));
    pump_until(&mut console, &mut events, |c| !c.command_history().is_empty()).await;

    let entry = &console.command_history()[0];
    assert_eq!(entry.agent_id, "a1");
    assert_eq!(entry.command, "whoami");
    assert_eq!(entry.output.as_deref(), Some("nt authority\\system"));
    assert!(entry.time().is_some());
    assert_eq!(
        console.notifications()[0].message,
        "Command executed successfully on a1"
    );

    // The garbage frame sent ahead of the ping response is dropped
    assert!(console.ping_agent("a1"));
    pump_until(&mut console, &mut events, |c| {
        c.notifications()[0].message == "Ping sent to a1"
    })
    .await;
    assert_eq!(console.notifications()[0].kind, NotificationKind::Success);
    assert_eq!(console.connection_state(), ConnectionState::Connected);
    assert_eq!(
        *frames.lock().unwrap(),
        vec!["commandResponse", "pingResponse"]
    );
}

#[tokio::test]
async fn test_operator_disconnect_notifies_once() {
    let base = start_server().await;
    let (mut console, mut events) = console();
    console.connect(&format!("{}/ws", base)).unwrap();
    pump_until(&mut console, &mut events, |c| !c.agents().is_empty()).await;

    console.disconnect();
    pump_until(&mut console, &mut events, |c| {
        c.connection_state() == ConnectionState::Disconnected
    })
    .await;

    assert_eq!(
        messages(&console),
        vec!["Disconnected from server", "Connected to server"]
    );
    assert!(!console.ping_agent("a1"));
}

#[tokio::test]
async fn test_server_hang_up_notifies() {
    let base = start_server().await;
    let (mut console, mut events) = console();
    console.connect(&format!("{}/hangup", base)).unwrap();

    pump_until(&mut console, &mut events, |c| {
        c.notifications()
            .iter()
            .any(|n| n.message == "Disconnected from server")
    })
    .await;

    assert_eq!(console.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_refused_connection_is_silent() {
    // Reserve a port, then free it so nothing is listening there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (mut console, mut events) = console();
    console.connect(&format!("ws://{}/ws", addr)).unwrap();
    pump_until(&mut console, &mut events, |c| {
        c.connection_state() == ConnectionState::Disconnected
    })
    .await;

    assert!(console.notifications().is_empty());
    assert_eq!(console.reconnect_attempts(), 0);
}
