//! Discord REST payloads
//!
//! Only the fields the bridge reads are modelled; everything else in the
//! API responses is ignored.

use serde::{Deserialize, Serialize};

/// Embed side colour (Discord blurple)
pub const EMBED_COLOR: u32 = 0x5865F2;

/// Discord caps embed descriptions at 4096 characters
pub const MAX_DESCRIPTION_CHARS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Name shown for the user in chat
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Snowflake ids grow monotonically; compare them numerically
    pub fn snowflake(&self) -> u64 {
        self.id.parse().unwrap_or(0)
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    /// Seconds to wait
    pub retry_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateMessage {
    pub embeds: Vec<Embed>,
}

impl CreateMessage {
    /// A single embed card: sender as the title, text as the body
    pub fn card(sender: impl Into<String>, text: &str) -> Self {
        Self {
            embeds: vec![Embed {
                title: sender.into(),
                description: text.chars().take(MAX_DESCRIPTION_CHARS).collect(),
                color: EMBED_COLOR,
            }],
        }
    }
}
