//! Wire protocol between the bridge and the game protocol gateway
//!
//! Messages are serialized as JSON with internally-tagged enums.
//! Format: {"Type": "MessageType", ...fields}
//!
//! The gateway owns the native game encoding; this side only sees the
//! handful of packets the bridge needs.

use relay_core::Position;
use serde::{Deserialize, Serialize};

/// Loading screen phase sent during the readiness handshake
pub mod screen_type {
    pub const BEGIN: u8 = 1;
    pub const END: u8 = 2;
}

/// How the gateway should authenticate the game client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Online account sign-in
    #[default]
    Microsoft,
    /// Offline-mode server, username only
    Offline,
}

/// Messages exchanged with the gateway
///
/// Note: `rename_all` on enums only affects variant names, not field names inside variants.
/// Each field must be explicitly renamed using `#[serde(rename = "...")]` for PascalCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", rename_all = "PascalCase")]
pub enum GameMessage {
    // === Gateway -> Bridge ===
    /// World joined; carries our entity id and spawn point
    StartGame {
        #[serde(rename = "RuntimeEntityId")]
        runtime_entity_id: u64,
        #[serde(rename = "Position")]
        position: Position,
    },

    /// An entity moved
    MovePlayer {
        #[serde(rename = "RuntimeEntityId")]
        runtime_entity_id: u64,
        #[serde(rename = "Position")]
        position: Position,
    },

    /// Non-fatal gateway error
    Error {
        #[serde(rename = "Code")]
        code: i32,
        #[serde(rename = "Message")]
        message: String,
    },

    // === Both directions ===
    /// Session closed by either side
    Disconnect {
        #[serde(rename = "Reason", default)]
        reason: String,
    },

    /// Chat line
    Text {
        #[serde(rename = "SourceName")]
        source_name: String,
        #[serde(rename = "Message")]
        message: String,
    },

    // === Bridge -> Gateway ===
    /// Open the game session
    Login {
        #[serde(rename = "Username")]
        username: String,
        #[serde(rename = "Auth")]
        auth: AuthMode,
    },

    /// Loading screen begin/end
    LoadingScreen {
        #[serde(rename = "ScreenType")]
        screen_type: u8,
    },

    /// Final handshake step; the client is now interactive
    SetLocalPlayerAsInitialized {
        #[serde(rename = "RuntimeEntityId")]
        runtime_entity_id: u64,
    },
}

/// The fixed readiness handshake sent right after `StartGame`
pub fn readiness_handshake(runtime_entity_id: u64) -> [GameMessage; 3] {
    [
        GameMessage::LoadingScreen {
            screen_type: screen_type::BEGIN,
        },
        GameMessage::LoadingScreen {
            screen_type: screen_type::END,
        },
        GameMessage::SetLocalPlayerAsInitialized { runtime_entity_id },
    ]
}

/// Serialize a message to JSON bytes
pub fn serialize(msg: &GameMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(msg)
}

/// Deserialize a message from JSON bytes
pub fn deserialize(bytes: &[u8]) -> Result<GameMessage, serde_json::Error> {
    serde_json::from_slice(bytes)
}
