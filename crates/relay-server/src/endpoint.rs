//! Endpoint adapter traits

use async_trait::async_trait;
use relay_core::{Endpoint, EndpointCommand, EndpointEvent, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffer size for adapter event streams
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Ordered stream of events from one adapter; ends after `Disconnected`
pub type EventStream = mpsc::Receiver<EndpointEvent>;

/// Trait for implementing an endpoint adapter
///
/// Implement this trait to plug an external system into the bridge. All
/// methods take `&self` so the controller can send from its event loop while
/// a stop request disconnects from another task.
#[async_trait]
pub trait EndpointAdapter: Send + Sync + 'static {
    /// Which side of the bridge this adapter serves
    fn endpoint(&self) -> Endpoint;

    /// Establish the transport and return the adapter's event stream
    ///
    /// Fails with `BridgeError::Connection` if the transport cannot be set up.
    async fn connect(&self) -> Result<EventStream>;

    /// Issue a command
    ///
    /// Fails with `BridgeError::NotConnected` before `Connected` or after
    /// `Disconnected`.
    async fn send(&self, command: EndpointCommand) -> Result<()>;

    /// Close the transport
    ///
    /// Idempotent. The event stream emits `Disconnected` and then ends.
    async fn disconnect(&self);
}

/// Builds a fresh adapter pair for every session
pub trait EndpointFactory: Send + Sync + 'static {
    fn game(&self) -> Arc<dyn EndpointAdapter>;
    fn chat(&self) -> Arc<dyn EndpointAdapter>;
}
