//! Normalized adapter events and commands
//!
//! Each endpoint adapter turns its native transport traffic into a stream of
//! [`EndpointEvent`]s and accepts [`EndpointCommand`]s. The bridge controller
//! never sees anything transport-specific.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two external systems the bridge connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// The game-world session
    Game,
    /// The text-chat community
    Chat,
}

impl Endpoint {
    /// The endpoint on the other side of the bridge
    pub fn peer(self) -> Self {
        match self {
            Endpoint::Game => Endpoint::Chat,
            Endpoint::Chat => Endpoint::Game,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Game => f.write_str("Game"),
            Endpoint::Chat => f.write_str("Chat"),
        }
    }
}

/// A point in the game world
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={}, y={}, z={}", self.x, self.y, self.z)
    }
}

/// Events surfaced by an endpoint adapter
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointEvent {
    /// Transport handshake complete
    Connected,
    /// Session identity assigned by the remote side (emitted once)
    IdentityAssigned(String),
    /// Authoritative position update
    PositionChanged(Position),
    /// Inbound chat message
    ChatReceived { sender: String, text: String },
    /// Non-fatal transport error
    Error(String),
    /// Terminal: no further events follow
    Disconnected,
}

/// Commands accepted by an endpoint adapter
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointCommand {
    /// Deliver a chat message, attributed to `sender`
    SendChat { sender: String, text: String },
    /// Close the connection
    Disconnect,
}

/// A chat message as received from one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Endpoint the message came from
    pub origin: Endpoint,
    /// Display name of the author
    pub sender: String,
    /// Untransformed message text
    pub raw_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer() {
        assert_eq!(Endpoint::Game.peer(), Endpoint::Chat);
        assert_eq!(Endpoint::Chat.peer(), Endpoint::Game);
    }

    #[test]
    fn test_position_display() {
        let pos = Position::new(1.5, 64.0, -3.25);
        assert_eq!(pos.to_string(), "x=1.5, y=64, z=-3.25");
        assert_eq!(Position::default(), Position::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_position_wire_format() {
        let json = r#"{"X":10.0,"Y":70.5,"Z":-2.0}"#;
        let pos: Position = serde_json::from_str(json).unwrap();
        assert_eq!(pos, Position::new(10.0, 70.5, -2.0));
    }
}
