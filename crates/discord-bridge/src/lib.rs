//! Chat-community endpoint adapter for bedrock-relay
//!
//! Talks to a single Discord channel over the REST API: new messages are
//! picked up by a background poller, outgoing chat is posted as an embed
//! card titled with the sender.

pub mod api;
pub mod client;
pub mod endpoint;
pub mod error;

pub use client::DiscordClient;
pub use endpoint::{DEFAULT_API_BASE, DiscordConfig, DiscordEndpoint};
pub use error::{ApiError, ApiResult};
