//! # relay-server
//!
//! Session bridge between a game-world endpoint and a chat endpoint.
//!
//! This crate provides:
//! - `EndpointAdapter` / `EndpointFactory` traits for plugging in endpoints
//! - `SessionState`, the single snapshot of live bridge state
//! - `BridgeController`, which owns the one active session and relays chat
//! - The HTTP control surface (start, stop, status, position)

pub mod control;
pub mod controller;
pub mod endpoint;
pub mod session;

#[cfg(test)]
mod testing;

pub use controller::{
    BridgeController, BridgeOptions, BridgeStatus, Lifecycle, Snapshot, StartOutcome, StopOutcome,
};
pub use endpoint::{EVENT_CHANNEL_CAPACITY, EndpointAdapter, EndpointFactory, EventStream};
pub use session::{Connectivity, LastChat, SessionState};
