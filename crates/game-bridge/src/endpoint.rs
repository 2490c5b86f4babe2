//! Game endpoint adapter over the TCP gateway

use crate::protocol::{AuthMode, GameMessage};
use crate::tcp::{TcpReadWrapper, TcpWriteWrapper};
use crate::transport::{ReaderContext, SharedWriter, reader_task, send_message};
use async_trait::async_trait;
use relay_core::{BridgeError, Endpoint, EndpointCommand, EndpointEvent, Result};
use relay_server::{EVENT_CHANNEL_CAPACITY, EndpointAdapter, EventStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long each step of `disconnect` may take: the writer lock, the
/// farewell frame and the reader task
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Configuration for the game gateway connection
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Gateway host (default: 127.0.0.1)
    pub host: String,
    /// Gateway port (default: 19132)
    pub port: u16,
    /// Account the bridge plays as
    pub username: String,
    /// Authentication mode passed to the gateway
    pub auth: AuthMode,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 19132,
            username: "RelayBot".into(),
            auth: AuthMode::Microsoft,
        }
    }
}

impl GameConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Game-world endpoint adapter
pub struct GameEndpoint {
    /// Connection configuration
    config: GameConfig,
    /// Writer half of the connection
    writer: SharedWriter,
    /// Stops the reader task
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    /// Background reader task handle
    reader_handle: Mutex<Option<JoinHandle<()>>>,
}

impl GameEndpoint {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            writer: Arc::new(Mutex::new(None)),
            shutdown_tx: Mutex::new(None),
            reader_handle: Mutex::new(None),
        }
    }
}

#[async_trait]
impl EndpointAdapter for GameEndpoint {
    fn endpoint(&self) -> Endpoint {
        Endpoint::Game
    }

    async fn connect(&self) -> Result<EventStream> {
        if self.writer.lock().await.is_some() {
            return Err(BridgeError::Connection("game endpoint already connected".into()));
        }

        let addr = self.config.address();
        info!("Connecting to game gateway at {} as {}", addr, self.config.username);

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| BridgeError::Connection(format!("Failed to connect to {}: {}", addr, e)))?;

        // Disable Nagle's algorithm for low latency
        stream
            .set_nodelay(true)
            .map_err(|e| BridgeError::Connection(format!("Failed to set TCP_NODELAY: {}", e)))?;

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(Box::new(TcpWriteWrapper(write_half)));

        let login = GameMessage::Login {
            username: self.config.username.clone(),
            auth: self.config.auth,
        };
        if let Err(e) = send_message(&self.writer, &login).await {
            self.writer.lock().await.take();
            return Err(BridgeError::Connection(format!("Login failed: {}", e)));
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        event_tx
            .send(EndpointEvent::Connected)
            .await
            .map_err(|_| BridgeError::Connection("event stream closed".into()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(reader_task(
            TcpReadWrapper(read_half),
            self.writer.clone(),
            ReaderContext {
                username: self.config.username.clone(),
            },
            event_tx,
            shutdown_rx,
        ));
        *self.shutdown_tx.lock().await = Some(shutdown_tx);
        *self.reader_handle.lock().await = Some(handle);

        info!("Connected to game gateway at {}", addr);
        Ok(event_rx)
    }

    async fn send(&self, command: EndpointCommand) -> Result<()> {
        match command {
            EndpointCommand::SendChat { sender, text } => {
                send_message(
                    &self.writer,
                    &GameMessage::Text {
                        source_name: sender,
                        message: text,
                    },
                )
                .await
            }
            EndpointCommand::Disconnect => {
                self.disconnect().await;
                Ok(())
            }
        }
    }

    async fn disconnect(&self) {
        match tokio::time::timeout(CLOSE_GRACE, self.writer.lock()).await {
            Ok(mut guard) => {
                if let Some(mut writer) = guard.take() {
                    let farewell = GameMessage::Disconnect {
                        reason: "bridge stopped".into(),
                    };
                    if let Ok(data) = crate::protocol::serialize(&farewell) {
                        let sent =
                            tokio::time::timeout(CLOSE_GRACE, writer.write_message(&data)).await;
                        if sent.is_err() {
                            warn!("Gateway is not reading, closing without farewell");
                        }
                    }
                    writer.shutdown().await;
                }
            }
            Err(_) => warn!("Game writer busy, closing without farewell"),
        }

        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(mut handle) = self.reader_handle.lock().await.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                warn!("Game reader task did not exit, aborting");
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{deserialize, serialize};
    use crate::transport::{AsyncReader, AsyncWriter};
    use relay_core::Position;
    use tokio::net::TcpListener;

    /// Minimal gateway standing in for the game side
    struct FakeGateway {
        reader: TcpReadWrapper,
        writer: TcpWriteWrapper,
    }

    impl FakeGateway {
        async fn recv(&mut self) -> GameMessage {
            deserialize(&self.reader.read_message().await.unwrap()).unwrap()
        }

        async fn push(&mut self, msg: GameMessage) {
            self.writer.write_message(&serialize(&msg).unwrap()).await.unwrap();
        }
    }

    async fn listen() -> (TcpListener, GameConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = GameConfig {
            port: listener.local_addr().unwrap().port(),
            username: "RelayBot".into(),
            auth: AuthMode::Offline,
            ..Default::default()
        };
        (listener, config)
    }

    async fn accept(listener: &TcpListener) -> FakeGateway {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        FakeGateway {
            reader: TcpReadWrapper(read_half),
            writer: TcpWriteWrapper(write_half),
        }
    }

    async fn joined() -> (GameEndpoint, EventStream, FakeGateway) {
        let (listener, config) = listen().await;
        let endpoint = GameEndpoint::new(config);
        let (events, mut gateway) = tokio::join!(endpoint.connect(), accept(&listener));
        let mut events = events.unwrap();

        assert_eq!(
            gateway.recv().await,
            GameMessage::Login {
                username: "RelayBot".into(),
                auth: AuthMode::Offline,
            }
        );
        assert_eq!(events.recv().await, Some(EndpointEvent::Connected));

        gateway
            .push(GameMessage::StartGame {
                runtime_entity_id: 77,
                position: Position::new(1.0, 65.0, -4.0),
            })
            .await;
        (endpoint, events, gateway)
    }

    #[tokio::test]
    async fn test_handshake_precedes_identity() {
        let (_endpoint, mut events, mut gateway) = joined().await;

        assert_eq!(gateway.recv().await, GameMessage::LoadingScreen { screen_type: 1 });
        assert_eq!(gateway.recv().await, GameMessage::LoadingScreen { screen_type: 2 });
        assert_eq!(
            gateway.recv().await,
            GameMessage::SetLocalPlayerAsInitialized {
                runtime_entity_id: 77
            }
        );

        assert_eq!(
            events.recv().await,
            Some(EndpointEvent::IdentityAssigned("77".into()))
        );
        assert_eq!(
            events.recv().await,
            Some(EndpointEvent::PositionChanged(Position::new(1.0, 65.0, -4.0)))
        );
    }

    #[tokio::test]
    async fn test_moves_chat_and_echo_filter() {
        let (endpoint, mut events, mut gateway) = joined().await;
        for _ in 0..3 {
            gateway.recv().await;
        }
        events.recv().await;
        events.recv().await;

        gateway
            .push(GameMessage::MovePlayer {
                runtime_entity_id: 12,
                position: Position::new(9.0, 9.0, 9.0),
            })
            .await;
        gateway
            .push(GameMessage::MovePlayer {
                runtime_entity_id: 77,
                position: Position::new(2.0, 66.0, -4.0),
            })
            .await;
        gateway
            .push(GameMessage::Text {
                source_name: "RelayBot".into(),
                message: "echo".into(),
            })
            .await;
        gateway
            .push(GameMessage::Text {
                source_name: "Alice".into(),
                message: "§ehi".into(),
            })
            .await;

        assert_eq!(
            events.recv().await,
            Some(EndpointEvent::PositionChanged(Position::new(2.0, 66.0, -4.0)))
        );
        assert_eq!(
            events.recv().await,
            Some(EndpointEvent::ChatReceived {
                sender: "Alice".into(),
                text: "§ehi".into(),
            })
        );

        endpoint
            .send(EndpointCommand::SendChat {
                sender: "RelayBot".into(),
                text: "hello from chat".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            gateway.recv().await,
            GameMessage::Text {
                source_name: "RelayBot".into(),
                message: "hello from chat".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_bad_frame_is_non_fatal() {
        let (_endpoint, mut events, mut gateway) = joined().await;
        events.recv().await;
        events.recv().await;

        gateway.writer.write_message(b"not json").await.unwrap();
        gateway
            .push(GameMessage::Error {
                code: 3,
                message: "throttled".into(),
            })
            .await;

        assert!(matches!(events.recv().await, Some(EndpointEvent::Error(_))));
        assert_eq!(
            events.recv().await,
            Some(EndpointEvent::Error("Error 3: throttled".into()))
        );
    }

    #[tokio::test]
    async fn test_gateway_disconnect_ends_stream() {
        let (endpoint, mut events, mut gateway) = joined().await;
        events.recv().await;
        events.recv().await;

        gateway
            .push(GameMessage::Disconnect {
                reason: "kicked".into(),
            })
            .await;

        assert_eq!(events.recv().await, Some(EndpointEvent::Disconnected));
        assert_eq!(events.recv().await, None);

        let err = endpoint
            .send(EndpointCommand::SendChat {
                sender: "RelayBot".into(),
                text: "late".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected(Endpoint::Game)));
    }

    #[tokio::test]
    async fn test_local_disconnect_is_idempotent() {
        let (endpoint, mut events, mut gateway) = joined().await;
        for _ in 0..3 {
            gateway.recv().await;
        }
        events.recv().await;
        events.recv().await;

        endpoint.disconnect().await;
        endpoint.disconnect().await;

        assert_eq!(
            gateway.recv().await,
            GameMessage::Disconnect {
                reason: "bridge stopped".into()
            }
        );
        assert_eq!(events.recv().await, Some(EndpointEvent::Disconnected));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let endpoint = GameEndpoint::new(GameConfig::default());
        let err = endpoint
            .send(EndpointCommand::SendChat {
                sender: "RelayBot".into(),
                text: "hi".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected(Endpoint::Game)));
        // Disconnecting an unconnected adapter is a no-op
        endpoint.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_bounded_when_gateway_stops_reading() {
        let (listener, config) = listen().await;
        let endpoint = GameEndpoint::new(config);
        let (events, accepted) = tokio::join!(endpoint.connect(), listener.accept());
        let _events = events.unwrap();
        // Keep the socket open but never read from it
        let _stalled = accepted.unwrap().0;

        let chunk = "x".repeat(64 * 1024);
        let mut buffer_full = false;
        for _ in 0..4096 {
            let send = endpoint.send(EndpointCommand::SendChat {
                sender: "RelayBot".into(),
                text: chunk.clone(),
            });
            if tokio::time::timeout(Duration::from_millis(100), send).await.is_err() {
                buffer_full = true;
                break;
            }
        }
        assert!(buffer_full, "socket buffer never filled");

        let closed = tokio::time::timeout(CLOSE_GRACE * 3, endpoint.disconnect()).await;
        assert!(closed.is_ok(), "disconnect hung on a stalled gateway");

        let err = endpoint
            .send(EndpointCommand::SendChat {
                sender: "RelayBot".into(),
                text: "late".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected(Endpoint::Game)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, config) = listen().await;
        drop(listener);

        let endpoint = GameEndpoint::new(config);
        let err = endpoint.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
    }
}
