//! Game-world endpoint adapter for bedrock-relay
//!
//! This crate provides:
//! - Wire protocol for the game protocol gateway
//! - Transport abstractions (AsyncReader/AsyncWriter traits)
//! - TCP transport
//! - Background reader task that runs the readiness handshake and
//!   normalizes gateway traffic into endpoint events
//! - `GameEndpoint`, the `EndpointAdapter` implementation

pub mod endpoint;
pub mod protocol;
pub mod tcp;
pub mod transport;

pub use endpoint::{GameConfig, GameEndpoint};
pub use protocol::{AuthMode, GameMessage, deserialize, serialize};
pub use transport::{AsyncReader, AsyncWriter, reader_task};
