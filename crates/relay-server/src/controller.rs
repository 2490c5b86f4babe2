//! Bridge controller: session lifecycle and chat relay
//!
//! The controller owns the single session slot. A session moves through
//! `Absent -> Starting -> Running -> Stopping -> Absent`. Events from both
//! adapters are consumed by one loop per session, so state changes are
//! applied strictly one at a time. Adapter I/O (connect, send, disconnect)
//! always happens outside the slot lock.

use crate::endpoint::{EndpointAdapter, EndpointFactory, EventStream};
use crate::session::{Applied, Connectivity, LastChat, SessionState};
use relay_core::{
    BridgeError, ChatEvent, Endpoint, EndpointCommand, EndpointEvent, MessageTransformer,
    Position, Result,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long `stop` waits for the session loop before aborting it
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Relay behaviour that is fixed for the lifetime of the controller
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Sender label attached to game chat relayed into the chat endpoint
    pub origin_label: String,
    /// Sender used when speaking in the game (the bridge's own identity)
    pub game_sender: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            origin_label: "Minecraft".into(),
            game_sender: "RelayBot".into(),
        }
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Absent,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Online,
    Offline,
}

/// Point-in-time view of the bridge for introspection
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub lifecycle: Lifecycle,
    pub connectivity: Connectivity,
    pub identity: Option<String>,
    pub position: Option<Position>,
    pub last_chat: Option<LastChat>,
}

/// One run of the bridge, from start to stop
struct Session {
    generation: u64,
    game: Arc<dyn EndpointAdapter>,
    chat: Arc<dyn EndpointAdapter>,
    state: SessionState,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Session {
    fn adapter(&self, endpoint: Endpoint) -> Arc<dyn EndpointAdapter> {
        match endpoint {
            Endpoint::Game => self.game.clone(),
            Endpoint::Chat => self.chat.clone(),
        }
    }
}

/// The "one active session" slot
struct Slot {
    lifecycle: Lifecycle,
    generation: u64,
    session: Option<Session>,
}

struct Shared {
    factory: Arc<dyn EndpointFactory>,
    transformer: MessageTransformer,
    options: BridgeOptions,
    slot: Mutex<Slot>,
}

/// What the session loop should do after an event
enum Flow {
    Continue,
    Teardown(Endpoint),
    Stale,
}

/// Owns at most one active session and relays chat between its endpoints
#[derive(Clone)]
pub struct BridgeController {
    shared: Arc<Shared>,
}

impl BridgeController {
    /// Create a controller; no session exists until `start`
    pub fn new(
        factory: Arc<dyn EndpointFactory>,
        transformer: MessageTransformer,
        options: BridgeOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                factory,
                transformer,
                options,
                slot: Mutex::new(Slot {
                    lifecycle: Lifecycle::Absent,
                    generation: 0,
                    session: None,
                }),
            }),
        }
    }

    /// Start a session: build both adapters and connect them
    ///
    /// Returns once both adapters are connected. The session becomes
    /// `Running` when the game readiness handshake and the chat connection
    /// have both been reported.
    pub async fn start(&self) -> Result<StartOutcome> {
        let (generation, game, chat, shutdown_rx) = {
            let mut slot = self.shared.slot.lock().await;
            match slot.lifecycle {
                Lifecycle::Starting | Lifecycle::Running => {
                    info!("Start requested but bridge is already running");
                    return Ok(StartOutcome::AlreadyRunning);
                }
                Lifecycle::Stopping => {
                    return Err(BridgeError::Connection("bridge is stopping".into()));
                }
                Lifecycle::Absent => {}
            }

            slot.generation += 1;
            let generation = slot.generation;
            let game = self.shared.factory.game();
            let chat = self.shared.factory.chat();
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            slot.lifecycle = Lifecycle::Starting;
            slot.session = Some(Session {
                generation,
                game: game.clone(),
                chat: chat.clone(),
                state: SessionState::connecting(),
                shutdown: shutdown_tx,
                task: None,
            });
            (generation, game, chat, shutdown_rx)
        };

        info!("Starting bridge session #{}", generation);

        // Dropped with this future; tells the connect task nobody is waiting
        let (_waiting, abandoned) = oneshot::channel::<()>();
        let connecting = tokio::spawn(self.clone().connect_session(
            generation,
            game,
            chat,
            shutdown_rx,
            abandoned,
        ));
        match connecting.await {
            Ok(outcome) => outcome,
            Err(e) => Err(BridgeError::Connection(format!("start task failed: {}", e))),
        }
    }

    /// Connect both adapters of session `generation` and hand its streams
    /// to a new session loop
    ///
    /// Runs as its own task so a dropped `start` cannot strand the slot in
    /// `Starting`: if the caller goes away before the hand-off, the session
    /// is torn down here.
    async fn connect_session(
        self,
        generation: u64,
        game: Arc<dyn EndpointAdapter>,
        chat: Arc<dyn EndpointAdapter>,
        mut shutdown_rx: watch::Receiver<bool>,
        mut abandoned: oneshot::Receiver<()>,
    ) -> Result<StartOutcome> {
        let streams = match connect_or_cancel(game.as_ref(), &mut shutdown_rx, &mut abandoned).await
        {
            Ok(game_rx) => connect_or_cancel(chat.as_ref(), &mut shutdown_rx, &mut abandoned)
                .await
                .map(|chat_rx| (game_rx, chat_rx)),
            Err(e) => Err(e),
        };
        let streams = streams.and_then(|streams| match abandoned.try_recv() {
            Err(oneshot::error::TryRecvError::Closed) => Err(BridgeError::Connection(
                "start abandoned by caller".into(),
            )),
            _ => Ok(streams),
        });

        let (game_rx, chat_rx) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                error!("Session #{} failed to start: {}", generation, e);
                if let Some(session) = self.begin_teardown(Some(generation)).await {
                    self.finish_teardown(session, None).await;
                } else {
                    game.disconnect().await;
                    chat.disconnect().await;
                }
                return Err(e);
            }
        };

        let mut slot = self.shared.slot.lock().await;
        let still_ours = slot.lifecycle == Lifecycle::Starting
            && slot.session.as_ref().map(|s| s.generation) == Some(generation);
        if !still_ours {
            drop(slot);
            warn!("Session #{} was stopped while connecting", generation);
            game.disconnect().await;
            chat.disconnect().await;
            return Err(BridgeError::Connection("start cancelled by stop".into()));
        }

        let task = tokio::spawn(self.clone().run_session(
            generation,
            game_rx,
            chat_rx,
            shutdown_rx,
        ));
        if let Some(session) = slot.session.as_mut() {
            session.task = Some(task);
        }
        info!("Session #{} connected, waiting for readiness", generation);
        Ok(StartOutcome::Started)
    }

    /// Stop the active session, if any
    ///
    /// Never fails. Safe to call from any task while events are in flight;
    /// events that arrive after this begins are dropped.
    pub async fn stop(&self) -> StopOutcome {
        let Some(mut session) = self.begin_teardown(None).await else {
            info!("Stop requested but bridge is not running");
            return StopOutcome::NotRunning;
        };

        info!("Stopping session #{}", session.generation);
        let task = session.task.take();
        self.finish_teardown(session, task).await;
        StopOutcome::Stopped
    }

    /// Online only while a session is running
    pub async fn status(&self) -> BridgeStatus {
        match self.shared.slot.lock().await.lifecycle {
            Lifecycle::Running => BridgeStatus::Online,
            _ => BridgeStatus::Offline,
        }
    }

    /// Last known position, `None` when offline
    pub async fn position(&self) -> Option<Position> {
        let slot = self.shared.slot.lock().await;
        if slot.lifecycle != Lifecycle::Running {
            return None;
        }
        slot.session.as_ref().and_then(|s| s.state.position())
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.shared.slot.lock().await.lifecycle
    }

    pub async fn snapshot(&self) -> Snapshot {
        let slot = self.shared.slot.lock().await;
        match slot.session.as_ref() {
            Some(session) => Snapshot {
                lifecycle: slot.lifecycle,
                connectivity: session.state.connectivity(),
                identity: session.state.identity().map(str::to_string),
                position: session.state.position(),
                last_chat: session.state.last_chat().cloned(),
            },
            None => Snapshot {
                lifecycle: slot.lifecycle,
                connectivity: Connectivity::Disconnected,
                identity: None,
                position: None,
                last_chat: None,
            },
        }
    }

    /// Take the session out of the slot and signal its loop to exit
    ///
    /// With `Some(generation)` only that session is taken.
    async fn begin_teardown(&self, generation: Option<u64>) -> Option<Session> {
        let mut slot = self.shared.slot.lock().await;
        let session = slot
            .session
            .take_if(|s| generation.is_none_or(|g| s.generation == g))?;
        slot.lifecycle = Lifecycle::Stopping;
        let _ = session.shutdown.send(true);
        Some(session)
    }

    /// Disconnect a taken session's adapters, wait for its loop (if given)
    /// and release the slot
    async fn finish_teardown(&self, session: Session, event_loop: Option<JoinHandle<()>>) {
        session.game.disconnect().await;
        session.chat.disconnect().await;

        if let Some(mut event_loop) = event_loop {
            if tokio::time::timeout(STOP_GRACE, &mut event_loop).await.is_err() {
                warn!("Session loop did not exit in time, aborting");
                event_loop.abort();
            }
        }

        let mut slot = self.shared.slot.lock().await;
        if slot.lifecycle == Lifecycle::Stopping && slot.session.is_none() {
            slot.lifecycle = Lifecycle::Absent;
        }
        info!("Session #{} torn down", session.generation);
    }

    /// Per-session event loop
    async fn run_session(
        self,
        generation: u64,
        mut game_rx: EventStream,
        mut chat_rx: EventStream,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            let (origin, event) = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown_rx) => {
                    debug!("Session #{} loop received shutdown", generation);
                    break;
                }
                event = game_rx.recv() => (Endpoint::Game, event.unwrap_or(EndpointEvent::Disconnected)),
                event = chat_rx.recv() => (Endpoint::Chat, event.unwrap_or(EndpointEvent::Disconnected)),
            };

            match self.process(generation, origin, event).await {
                Flow::Continue => {}
                Flow::Stale => {
                    debug!("Session #{} no longer active, dropping events", generation);
                    break;
                }
                Flow::Teardown(endpoint) => {
                    let reason = BridgeError::UnexpectedDisconnect(endpoint);
                    warn!("Session #{}: {}, tearing down", generation, reason);
                    // The loop is this task, so its handle is dropped rather than awaited
                    if let Some(session) = self.begin_teardown(Some(generation)).await {
                        self.finish_teardown(session, None).await;
                    }
                    break;
                }
            }
        }
    }

    /// Apply one event under the slot lock, then forward chat outside it
    async fn process(&self, generation: u64, origin: Endpoint, event: EndpointEvent) -> Flow {
        match &event {
            EndpointEvent::Error(detail) => warn!("{} transport error: {}", origin, detail),
            other => debug!("[{}] {:?}", origin, other),
        }

        let forward = {
            let mut slot = self.shared.slot.lock().await;
            let Slot {
                lifecycle, session, ..
            } = &mut *slot;
            let Some(session) = session.as_mut().filter(|s| s.generation == generation) else {
                return Flow::Stale;
            };
            if !matches!(*lifecycle, Lifecycle::Starting | Lifecycle::Running) {
                return Flow::Stale;
            }

            match session.state.apply(origin, event, SystemTime::now()) {
                Applied::Updated => None,
                Applied::Ready => {
                    *lifecycle = Lifecycle::Running;
                    info!(
                        "Session #{} is running (identity {})",
                        generation,
                        session.state.identity().unwrap_or("unknown")
                    );
                    None
                }
                Applied::Chat(chat) if *lifecycle == Lifecycle::Running => self
                    .relay_command(&chat)
                    .map(|command| (session.adapter(chat.origin.peer()), command)),
                Applied::Chat(chat) => {
                    debug!("Not relaying {} chat before session is ready", chat.origin);
                    None
                }
                Applied::Disconnected(endpoint) => return Flow::Teardown(endpoint),
            }
        };

        if let Some((target, command)) = forward {
            if let Err(e) = target.send(command).await {
                warn!("Dropped relay to {} endpoint: {}", target.endpoint(), e);
            }
        }
        Flow::Continue
    }

    /// Build the command that relays `chat` to the opposite endpoint
    fn relay_command(&self, chat: &ChatEvent) -> Option<EndpointCommand> {
        let (sender, text) = match chat.origin {
            Endpoint::Game => (
                self.shared.options.origin_label.clone(),
                self.shared.transformer.relay(&chat.raw_text),
            ),
            // Chat-side formatting is trusted as-is
            Endpoint::Chat => (
                self.shared.options.game_sender.clone(),
                chat.raw_text.clone(),
            ),
        };

        if text.trim().is_empty() {
            debug!("Skipping empty relay from {}", chat.sender);
            return None;
        }
        Some(EndpointCommand::SendChat { sender, text })
    }
}

/// Connect an adapter unless the session is stopped or abandoned first
async fn connect_or_cancel(
    adapter: &dyn EndpointAdapter,
    shutdown_rx: &mut watch::Receiver<bool>,
    abandoned: &mut oneshot::Receiver<()>,
) -> Result<EventStream> {
    tokio::select! {
        result = adapter.connect() => result,
        _ = stop_requested(shutdown_rx) => Err(BridgeError::Connection(format!(
            "{} connect cancelled by stop",
            adapter.endpoint()
        ))),
        _ = abandoned => Err(BridgeError::Connection(format!(
            "{} connect abandoned by caller",
            adapter.endpoint()
        ))),
    }
}

/// Resolves once shutdown is signalled or the sender is gone
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
