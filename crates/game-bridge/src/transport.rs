//! Transport abstractions for the game gateway
//!
//! Provides AsyncReader/AsyncWriter traits that can be implemented
//! for different transport mechanisms, plus the background reader task
//! that turns gateway frames into normalized endpoint events.

use crate::protocol::{GameMessage, deserialize, readiness_handshake, serialize};
use async_trait::async_trait;
use relay_core::{BridgeError, Endpoint, EndpointEvent, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

/// Largest frame accepted from the gateway (64 MiB)
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Trait for async reading from a transport
#[async_trait]
pub trait AsyncReader: Send {
    /// Read a complete message from the transport
    /// Messages are length-prefixed: 4-byte little-endian length + JSON payload
    async fn read_message(&mut self) -> Result<Vec<u8>>;
}

/// Trait for async writing to a transport
#[async_trait]
pub trait AsyncWriter: Send + Sync {
    /// Write a complete message to the transport
    /// Messages are length-prefixed: 4-byte little-endian length + JSON payload
    async fn write_message(&mut self, data: &[u8]) -> Result<()>;

    /// Close the write direction
    async fn shutdown(&mut self);
}

/// Writer half shared between the adapter and its reader task; `None` when
/// the connection is closed
pub type SharedWriter = Arc<Mutex<Option<Box<dyn AsyncWriter>>>>;

/// Serialize and write one message
pub async fn send_message(writer: &SharedWriter, msg: &GameMessage) -> Result<()> {
    let data = serialize(msg)?;

    let json_preview: String = String::from_utf8_lossy(&data).chars().take(200).collect();
    debug!("[Bridge→Gateway] len={} json={}", data.len(), json_preview);

    let mut guard = writer.lock().await;
    let writer = guard
        .as_mut()
        .ok_or(BridgeError::NotConnected(Endpoint::Game))?;
    writer.write_message(&data).await
}

/// Per-connection settings the reader task needs
#[derive(Debug, Clone)]
pub struct ReaderContext {
    /// Our own username; chat from it is not surfaced
    pub username: String,
}

/// Outcome of handling one gateway message
enum Step {
    Continue,
    Close(String),
}

/// Background reader task that handles incoming gateway messages
///
/// This task:
/// - Decodes frames from the gateway
/// - Runs the readiness handshake when the world is joined
/// - Surfaces identity, position and chat as endpoint events
/// - Emits `Disconnected` exactly once when the connection ends, whether
///   the gateway closed it or `shutdown_rx` fired
pub async fn reader_task<R: AsyncReader>(
    mut reader: R,
    writer: SharedWriter,
    context: ReaderContext,
    event_tx: mpsc::Sender<EndpointEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut runtime_id: Option<u64> = None;

    let reason = loop {
        tokio::select! {
            biased;

            _ = stop_requested(&mut shutdown_rx) => {
                break "disconnect requested".to_string();
            }

            frame = reader.read_message() => {
                let data = match frame {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Gateway read failed: {}", e);
                        let _ = event_tx.send(EndpointEvent::Error(e.to_string())).await;
                        break "connection lost".to_string();
                    }
                };

                let json_preview: String = String::from_utf8_lossy(&data).chars().take(200).collect();
                debug!("[Gateway→Bridge] len={} json={}", data.len(), json_preview);

                let msg = match deserialize(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Failed to deserialize gateway message: {}", e);
                        if event_tx.send(EndpointEvent::Error(e.to_string())).await.is_err() {
                            break "event stream dropped".to_string();
                        }
                        continue;
                    }
                };

                match handle_message(msg, &mut runtime_id, &writer, &context, &event_tx).await {
                    Step::Continue => {}
                    Step::Close(reason) => break reason,
                }
            }
        }
    };

    info!("Game connection closed: {}", reason);
    if let Some(mut writer) = writer.lock().await.take() {
        writer.shutdown().await;
    }
    let _ = event_tx.send(EndpointEvent::Disconnected).await;
}

/// Resolves once shutdown is signalled or the sender is gone
///
/// The `watch::Ref` from `wait_for` is `!Send` and must not outlive this call.
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

async fn handle_message(
    msg: GameMessage,
    runtime_id: &mut Option<u64>,
    writer: &SharedWriter,
    context: &ReaderContext,
    event_tx: &mpsc::Sender<EndpointEvent>,
) -> Step {
    let events = match msg {
        GameMessage::StartGame {
            runtime_entity_id,
            position,
        } => {
            if runtime_id.is_some() {
                warn!("Ignoring repeated StartGame for {}", runtime_entity_id);
                return Step::Continue;
            }
            info!("Runtime entity id assigned: {}", runtime_entity_id);

            for step in readiness_handshake(runtime_entity_id) {
                if let Err(e) = send_message(writer, &step).await {
                    error!("Readiness handshake failed: {}", e);
                    let _ = event_tx.send(EndpointEvent::Error(e.to_string())).await;
                    return Step::Close("handshake failed".into());
                }
            }
            *runtime_id = Some(runtime_entity_id);
            info!("Spawned at {}", position);

            vec![
                EndpointEvent::IdentityAssigned(runtime_entity_id.to_string()),
                EndpointEvent::PositionChanged(position),
            ]
        }

        GameMessage::MovePlayer {
            runtime_entity_id,
            position,
        } => {
            if *runtime_id != Some(runtime_entity_id) {
                return Step::Continue;
            }
            debug!("Moved to {}", position);
            vec![EndpointEvent::PositionChanged(position)]
        }

        GameMessage::Text {
            source_name,
            message,
        } => {
            if source_name == context.username {
                return Step::Continue;
            }
            vec![EndpointEvent::ChatReceived {
                sender: source_name,
                text: message,
            }]
        }

        GameMessage::Error { code, message } => {
            vec![EndpointEvent::Error(format!("Error {}: {}", code, message))]
        }

        GameMessage::Disconnect { reason } => {
            return Step::Close(if reason.is_empty() {
                "gateway disconnected".into()
            } else {
                reason
            });
        }

        other => {
            warn!("Unexpected message from gateway: {:?}", other);
            return Step::Continue;
        }
    };

    for event in events {
        if event_tx.send(event).await.is_err() {
            return Step::Close("event stream dropped".into());
        }
    }
    Step::Continue
}
