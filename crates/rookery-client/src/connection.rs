//! WebSocket connection to the game server.
//!
//! The connection is two tasks: a reader that turns server frames into session inputs and
//! a writer that drains the outbound channel. Neither touches match state.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::SessionInput;
use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use rookery_core::MatchEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// A live connection
pub struct Connection {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Sender for messages to the server
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outbound.clone()
    }

    pub fn close(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Connect to `url` and start forwarding server messages into `inputs`.
///
/// When the socket closes or fails, a single `Disconnected` event is queued.
pub async fn connect(
    url: &str,
    inputs: mpsc::UnboundedSender<SessionInput>,
) -> anyhow::Result<Connection> {
    let (ws_stream, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    info!("Connected to {}", url);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    debug!("-> {}", text);
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode {:?}: {}", msg, e),
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!("<- {}", text);
                    let Some(event) = decode(&text) else {
                        continue;
                    };
                    if inputs.send(SessionInput::Event(event)).is_err() {
                        return;
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Server closed connection");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        let _ = inputs.send(SessionInput::Event(MatchEvent::Disconnected));
    });

    Ok(Connection {
        outbound: tx,
        reader,
        writer,
    })
}

/// Parse one text frame into a match event
fn decode(text: &str) -> Option<MatchEvent> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Error { message }) => {
            warn!("Server error: {}", message);
            None
        }
        Ok(msg) => msg.into_event(),
        Err(e) => {
            warn!("Ignoring unrecognized message ({}): {}", e, text);
            None
        }
    }
}
