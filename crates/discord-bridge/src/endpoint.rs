//! Chat endpoint adapter polling one Discord channel

use crate::api::{CreateMessage, Message};
use crate::client::DiscordClient;
use crate::error::ApiError;
use async_trait::async_trait;
use relay_core::{BridgeError, Endpoint, EndpointCommand, EndpointEvent, Result};
use relay_server::{EVENT_CHANNEL_CAPACITY, EndpointAdapter, EventStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// How long `disconnect` waits for the poller to wind down
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Configuration for the Discord channel connection
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token
    pub token: String,
    /// Channel the bridge reads from and posts to
    pub channel_id: String,
    /// REST API root (default: https://discord.com/api/v10)
    pub api_base: String,
    /// Delay between polls for new messages (default: 2s)
    pub poll_interval: Duration,
    /// Per-request timeout (default: 10s)
    pub request_timeout: Duration,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: String::new(),
            api_base: DEFAULT_API_BASE.into(),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl DiscordConfig {
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(BridgeError::Config("Discord token is empty".into()));
        }
        if self.channel_id.trim().is_empty() {
            return Err(BridgeError::Config("Discord channel id is empty".into()));
        }
        Ok(())
    }
}

/// State of one live connection
struct Live {
    client: Arc<DiscordClient>,
    /// Cleared by the poller when it exits
    connected: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    poller: JoinHandle<()>,
}

/// Discord chat endpoint adapter
pub struct DiscordEndpoint {
    config: DiscordConfig,
    live: Mutex<Option<Live>>,
}

impl DiscordEndpoint {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            live: Mutex::new(None),
        }
    }
}

#[async_trait]
impl EndpointAdapter for DiscordEndpoint {
    fn endpoint(&self) -> Endpoint {
        Endpoint::Chat
    }

    async fn connect(&self) -> Result<EventStream> {
        let mut live = self.live.lock().await;
        if live
            .as_ref()
            .is_some_and(|l| l.connected.load(Ordering::SeqCst))
        {
            return Err(BridgeError::Connection("chat endpoint already connected".into()));
        }

        self.config
            .validate()
            .map_err(|e| BridgeError::Connection(e.to_string()))?;
        let client = DiscordClient::new(
            &self.config.api_base,
            &self.config.token,
            &self.config.channel_id,
            self.config.request_timeout,
        )
        .map_err(|e| BridgeError::Connection(e.to_string()))?;

        let me = client
            .current_user()
            .await
            .map_err(|e| BridgeError::Connection(format!("Discord login failed: {}", e)))?;
        let channel = client.channel().await.map_err(|e| {
            BridgeError::Connection(format!(
                "Channel {} is not accessible: {}",
                self.config.channel_id, e
            ))
        })?;
        let cursor = client
            .latest_message_id()
            .await
            .map_err(|e| BridgeError::Connection(format!("Failed to read channel history: {}", e)))?;

        info!(
            "Logged in to Discord as {} watching #{}",
            me.username,
            channel.name.as_deref().unwrap_or(&channel.id)
        );

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        event_tx
            .send(EndpointEvent::Connected)
            .await
            .map_err(|_| BridgeError::Connection("event stream closed".into()))?;

        let client = Arc::new(client);
        let connected = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = tokio::spawn(poll_task(
            client.clone(),
            PollContext {
                bot_id: me.id,
                cursor,
                interval: self.config.poll_interval,
            },
            connected.clone(),
            event_tx,
            shutdown_rx,
        ));

        *live = Some(Live {
            client,
            connected,
            shutdown_tx,
            poller,
        });
        Ok(event_rx)
    }

    async fn send(&self, command: EndpointCommand) -> Result<()> {
        match command {
            EndpointCommand::SendChat { sender, text } => {
                let client = {
                    let live = self.live.lock().await;
                    match live.as_ref() {
                        Some(l) if l.connected.load(Ordering::SeqCst) => l.client.clone(),
                        _ => return Err(BridgeError::NotConnected(Endpoint::Chat)),
                    }
                };
                client
                    .create_message(&CreateMessage::card(sender, &text))
                    .await?;
                Ok(())
            }
            EndpointCommand::Disconnect => {
                self.disconnect().await;
                Ok(())
            }
        }
    }

    async fn disconnect(&self) {
        let Some(live) = self.live.lock().await.take() else {
            return;
        };
        live.connected.store(false, Ordering::SeqCst);
        let _ = live.shutdown_tx.send(true);

        let mut poller = live.poller;
        if tokio::time::timeout(CLOSE_GRACE, &mut poller).await.is_err() {
            warn!("Discord poller did not stop in time, aborting");
            poller.abort();
        }
        info!("Disconnected from Discord");
    }
}

struct PollContext {
    /// Our own user id; its messages are not surfaced
    bot_id: String,
    /// Newest message already seen
    cursor: Option<String>,
    interval: Duration,
}

/// Background task that polls the channel and emits chat events
///
/// Emits `Disconnected` exactly once on exit, whether `shutdown_rx` fired or
/// the API rejected the token.
async fn poll_task(
    client: Arc<DiscordClient>,
    mut context: PollContext,
    connected: Arc<AtomicBool>,
    event_tx: mpsc::Sender<EndpointEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut delay = context.interval;

    let reason = loop {
        tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown_rx) => break "disconnect requested".to_string(),
            _ = tokio::time::sleep(delay) => {}
        }
        delay = context.interval;

        let fetched = tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown_rx) => break "disconnect requested".to_string(),
            fetched = client.messages_after(context.cursor.as_deref()) => fetched,
        };

        match fetched {
            Ok(messages) => {
                if let Some(newest) = messages.last() {
                    context.cursor = Some(newest.id.clone());
                }
                let mut dropped = false;
                for message in messages {
                    let Some(event) = chat_event(&message, &context.bot_id) else {
                        continue;
                    };
                    if event_tx.send(event).await.is_err() {
                        dropped = true;
                        break;
                    }
                }
                if dropped {
                    break "event stream dropped".to_string();
                }
            }
            Err(ApiError::RateLimited { retry_after }) => {
                warn!("Discord rate limited, retrying in {:?}", retry_after);
                delay = retry_after.max(context.interval);
            }
            Err(e) if e.is_fatal() => {
                error!("Discord rejected the bot: {}", e);
                let _ = event_tx.send(EndpointEvent::Error(e.to_string())).await;
                break "access revoked".to_string();
            }
            Err(e) => {
                warn!("Discord poll failed: {}", e);
                if event_tx.send(EndpointEvent::Error(e.to_string())).await.is_err() {
                    break "event stream dropped".to_string();
                }
            }
        }
    };

    info!("Discord poller stopped: {}", reason);
    connected.store(false, Ordering::SeqCst);
    let _ = event_tx.send(EndpointEvent::Disconnected).await;
}

/// Resolves once shutdown is signalled or the sender is gone
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Normalize a channel message, skipping our own, other bots and empty ones
fn chat_event(message: &Message, bot_id: &str) -> Option<EndpointEvent> {
    if message.author.id == bot_id || message.author.bot {
        return None;
    }
    if message.content.trim().is_empty() {
        debug!("Skipping message {} without text", message.id);
        return None;
    }
    Some(EndpointEvent::ChatReceived {
        sender: message.author.display_name().to_string(),
        text: message.content.clone(),
    })
}
