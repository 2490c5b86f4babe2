//! Builds the concrete adapter pair for each session

use discord_bridge::{DiscordConfig, DiscordEndpoint};
use game_bridge::{GameConfig, GameEndpoint};
use relay_server::{EndpointAdapter, EndpointFactory};
use std::sync::Arc;

/// Game gateway + Discord channel
pub struct RelayFactory {
    game: GameConfig,
    chat: DiscordConfig,
}

impl RelayFactory {
    pub fn new(game: GameConfig, chat: DiscordConfig) -> Self {
        Self { game, chat }
    }
}

impl EndpointFactory for RelayFactory {
    fn game(&self) -> Arc<dyn EndpointAdapter> {
        Arc::new(GameEndpoint::new(self.game.clone()))
    }

    fn chat(&self) -> Arc<dyn EndpointAdapter> {
        Arc::new(DiscordEndpoint::new(self.chat.clone()))
    }
}
