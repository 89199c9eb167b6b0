//! Websocket transport built on tokio-tungstenite
//!
//! Each socket runs as its own tokio task. The task reports lifecycle
//! events into a single channel shared by every socket the connector opens,
//! and drains an outbound channel fed by [`Socket::send_text`].

use crate::transport::{
    ConnectionId, Connector, ReadyState, Socket, SocketEvent, TransportError, TransportEvent,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Receiving end of the event channel
pub type WsEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Opens websocket connections
///
/// Must be used from inside a tokio runtime: [`Connector::open`] spawns the
/// socket task.
#[derive(Debug, Clone)]
pub struct WsConnector {
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WsConnector {
    /// Create a connector and the channel its sockets report into
    pub fn new() -> (Self, WsEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }
}

impl Connector for WsConnector {
    fn open(&mut self, connection: ConnectionId, url: &Url) -> Box<dyn Socket> {
        let ready = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();

        tokio::spawn(run_socket(SocketTask {
            connection,
            url: url.clone(),
            ready: ready.clone(),
            outbound: outbound_rx,
            close: close_rx,
            events: self.events.clone(),
        }));

        Box::new(WsSocket {
            ready,
            outbound: outbound_tx,
            close: Some(close_tx),
        })
    }
}

/// Handle to a socket task
struct WsSocket {
    ready: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Message>,
    close: Option<oneshot::Sender<()>>,
}

impl Socket for WsSocket {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::SeqCst))
    }

    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = self
                .ready
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                    (state != ReadyState::Closed as u8).then_some(ReadyState::Closing as u8)
                });
            let _ = close.send(());
        }
    }
}

struct SocketTask {
    connection: ConnectionId,
    url: Url,
    ready: Arc<AtomicU8>,
    outbound: mpsc::UnboundedReceiver<Message>,
    close: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl SocketTask {
    fn emit(&self, event: SocketEvent) {
        // The console may have gone away; nobody is left to tell
        let _ = self.events.send(TransportEvent {
            connection: self.connection,
            event,
        });
    }

    fn set_ready(&self, state: ReadyState) {
        self.ready.store(state as u8, Ordering::SeqCst);
    }
}

async fn run_socket(mut task: SocketTask) {
    info!(connection = task.connection.0, url = %task.url, "Opening websocket");

    let connect = tokio::select! {
        result = connect_async(task.url.as_str()) => result,
        _ = &mut task.close => {
            debug!(connection = task.connection.0, "Closed before handshake completed");
            task.set_ready(ReadyState::Closed);
            task.emit(SocketEvent::Close);
            return;
        }
    };

    let stream = match connect {
        Ok((stream, _response)) => stream,
        Err(e) => {
            task.set_ready(ReadyState::Closed);
            task.emit(SocketEvent::Error(e.to_string()));
            task.emit(SocketEvent::Close);
            return;
        }
    };

    // close() may have raced the handshake; it leaves the state at Closing
    let opened = task
        .ready
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .is_ok();
    if opened {
        task.emit(SocketEvent::Open);
    }

    let (mut sender, mut receiver) = stream.split();
    let mut closing = false;

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => task.emit(SocketEvent::Message(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    warn!(connection = task.connection.0, len = bytes.len(), "Dropping binary frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    task.emit(SocketEvent::Error(e.to_string()));
                    break;
                }
            },
            message = task.outbound.recv(), if !closing => match message {
                Some(message) => {
                    if let Err(e) = sender.send(message).await {
                        task.emit(SocketEvent::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    closing = true;
                    let _ = sender.send(Message::Close(None)).await;
                }
            },
            _ = &mut task.close, if !closing => {
                closing = true;
                task.set_ready(ReadyState::Closing);
                if let Err(e) = sender.send(Message::Close(None)).await {
                    debug!(connection = task.connection.0, "Close frame not sent: {}", e);
                    break;
                }
            }
        }
    }

    task.set_ready(ReadyState::Closed);
    task.emit(SocketEvent::Close);
    info!(connection = task.connection.0, "Websocket closed");
}
