//! # relay-core
//!
//! Core types for the bedrock-relay bridge.
//!
//! This crate provides the vocabulary shared by the bridge controller and
//! both endpoint adapters:
//! - Endpoint identities and world positions
//! - Normalized adapter events and commands
//! - Error types
//! - The chat message transformer

pub mod error;
pub mod event;
pub mod transform;

pub use error::{BridgeError, Result};
pub use event::{ChatEvent, Endpoint, EndpointCommand, EndpointEvent, Position};
pub use transform::{DEFAULT_MARKER, MessageTransformer};
