//! Scripted endpoint adapters for controller and control-surface tests

use crate::endpoint::{EVENT_CHANNEL_CAPACITY, EndpointAdapter, EndpointFactory, EventStream};
use async_trait::async_trait;
use relay_core::{BridgeError, Endpoint, EndpointCommand, EndpointEvent, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectBehavior {
    #[default]
    Succeed,
    Fail,
    Hang,
}

/// Adapter whose event stream is driven by the test
pub struct ScriptedEndpoint {
    endpoint: Endpoint,
    behavior: ConnectBehavior,
    events: Mutex<Option<mpsc::Sender<EndpointEvent>>>,
    sent: Mutex<Vec<EndpointCommand>>,
    connected: AtomicBool,
    disconnects: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn new(endpoint: Endpoint, behavior: ConnectBehavior) -> Self {
        Self {
            endpoint,
            behavior,
            events: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Push an event into the stream; a no-op once the stream is closed
    pub async fn emit(&self, event: EndpointEvent) {
        let tx = self.events.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// End the stream without a `Disconnected` event
    pub fn close_stream(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.events.lock().unwrap().take();
    }

    pub fn sent(&self) -> Vec<EndpointCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointAdapter for ScriptedEndpoint {
    fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    async fn connect(&self) -> Result<EventStream> {
        match self.behavior {
            ConnectBehavior::Succeed => {}
            ConnectBehavior::Fail => {
                return Err(BridgeError::Connection(format!(
                    "{} refused connection",
                    self.endpoint
                )));
            }
            ConnectBehavior::Hang => std::future::pending::<()>().await,
        }
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *self.events.lock().unwrap() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn send(&self, command: EndpointCommand) -> Result<()> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected(self.endpoint));
        }
        if command == EndpointCommand::Disconnect {
            self.disconnect().await;
            return Ok(());
        }
        self.sent.lock().unwrap().push(command);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        let tx = self.events.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.try_send(EndpointEvent::Disconnected);
        }
    }
}

/// Factory that records every adapter it hands out
#[derive(Default)]
pub struct ScriptedFactory {
    game_behavior: ConnectBehavior,
    chat_behavior: ConnectBehavior,
    games: Mutex<Vec<Arc<ScriptedEndpoint>>>,
    chats: Mutex<Vec<Arc<ScriptedEndpoint>>>,
}

impl ScriptedFactory {
    pub fn failing_chat(mut self) -> Self {
        self.chat_behavior = ConnectBehavior::Fail;
        self
    }

    pub fn hanging_game(mut self) -> Self {
        self.game_behavior = ConnectBehavior::Hang;
        self
    }

    /// Number of adapter pairs created so far
    pub fn created(&self) -> usize {
        self.games.lock().unwrap().len()
    }

    pub fn game_at(&self, index: usize) -> Arc<ScriptedEndpoint> {
        self.games.lock().unwrap()[index].clone()
    }

    pub fn chat_at(&self, index: usize) -> Arc<ScriptedEndpoint> {
        self.chats.lock().unwrap()[index].clone()
    }
}

impl EndpointFactory for ScriptedFactory {
    fn game(&self) -> Arc<dyn EndpointAdapter> {
        let adapter = Arc::new(ScriptedEndpoint::new(Endpoint::Game, self.game_behavior));
        self.games.lock().unwrap().push(adapter.clone());
        adapter
    }

    fn chat(&self) -> Arc<dyn EndpointAdapter> {
        let adapter = Arc::new(ScriptedEndpoint::new(Endpoint::Chat, self.chat_behavior));
        self.chats.lock().unwrap().push(adapter.clone());
        adapter
    }
}

/// Poll `check` until it holds, panicking after two seconds
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
