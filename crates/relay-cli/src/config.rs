//! Configuration for the `bedrock-relay` binary.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`bedrock-relay.toml` in the working directory)
//! 4. Compiled defaults

use discord_bridge::{DEFAULT_API_BASE, DiscordConfig};
use game_bridge::{AuthMode, GameConfig};
use relay_core::{DEFAULT_MARKER, MessageTransformer};
use relay_server::BridgeOptions;
use relay_server::control::DEFAULT_START_TIMEOUT;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "bedrock-relay.toml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A required setting has no value in any layer.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    game: GameFileConfig,
    chat: ChatFileConfig,
    bridge: BridgeFileConfig,
    control: ControlFileConfig,
    log_level: Option<String>,
}

/// `[game]` section
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct GameFileConfig {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    auth: Option<AuthMode>,
}

/// `[chat]` section
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    token: Option<String>,
    channel_id: Option<String>,
    api_base: Option<String>,
    poll_interval_ms: Option<u64>,
}

/// `[bridge]` section
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BridgeFileConfig {
    marker: Option<char>,
    origin_label: Option<String>,
    substitutions: BTreeMap<String, String>,
}

/// `[control]` section
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ControlFileConfig {
    bind: Option<String>,
    start_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthArg {
    Microsoft,
    Offline,
}

impl From<AuthArg> for AuthMode {
    fn from(arg: AuthArg) -> Self {
        match arg {
            AuthArg::Microsoft => AuthMode::Microsoft,
            AuthArg::Offline => AuthMode::Offline,
        }
    }
}

/// CLI arguments for the relay.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Relay chat between a Minecraft Bedrock server and a Discord channel")]
pub struct CliArgs {
    /// Path to config file (default: `./bedrock-relay.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Game gateway host.
    #[arg(long, env = "BEDROCK_HOST")]
    pub host: Option<String>,

    /// Game gateway port.
    #[arg(long, env = "BEDROCK_PORT")]
    pub port: Option<u16>,

    /// Account the bridge plays as.
    #[arg(short, long, env = "BEDROCK_USERNAME")]
    pub username: Option<String>,

    /// Game authentication mode.
    #[arg(long, value_enum)]
    pub auth: Option<AuthArg>,

    /// Discord bot token.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Discord channel to bridge.
    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    pub channel_id: Option<String>,

    /// Control surface bind address.
    #[arg(short, long, env = "RELAY_BIND")]
    pub bind: Option<String>,

    /// Log level filter used when `RUST_LOG` is unset.
    #[arg(long, env = "RELAY_LOG")]
    pub log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub game: GameConfig,
    pub chat: DiscordConfig,
    pub marker: char,
    /// Literal substitutions in the order they are tried
    pub substitutions: Vec<(String, String)>,
    pub origin_label: String,
    pub bind_addr: String,
    pub start_timeout: Duration,
    pub log_level: String,
}

impl RelayConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// A missing default file is treated as empty config; a missing
    /// `--config` file is an error.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, file)
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: ConfigFile) -> Result<Self, ConfigError> {
        let game_defaults = GameConfig::default();
        let chat_defaults = DiscordConfig::default();

        let token = cli
            .token
            .clone()
            .or(file.chat.token)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("chat.token"))?;
        let channel_id = cli
            .channel_id
            .clone()
            .or(file.chat.channel_id)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ConfigError::Missing("chat.channel_id"))?;

        // Longer tokens first so "teh " wins over "te" at the same position
        let mut substitutions: Vec<(String, String)> = file
            .bridge
            .substitutions
            .into_iter()
            .filter(|(token, _)| !token.is_empty())
            .collect();
        substitutions.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(Self {
            game: GameConfig {
                host: cli.host.clone().or(file.game.host).unwrap_or(game_defaults.host),
                port: cli.port.or(file.game.port).unwrap_or(game_defaults.port),
                username: cli
                    .username
                    .clone()
                    .or(file.game.username)
                    .unwrap_or(game_defaults.username),
                auth: cli
                    .auth
                    .map(AuthMode::from)
                    .or(file.game.auth)
                    .unwrap_or(game_defaults.auth),
            },
            chat: DiscordConfig {
                token,
                channel_id,
                api_base: file
                    .chat
                    .api_base
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                poll_interval: file
                    .chat
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(chat_defaults.poll_interval),
                request_timeout: chat_defaults.request_timeout,
            },
            marker: file.bridge.marker.unwrap_or(DEFAULT_MARKER),
            substitutions,
            origin_label: file
                .bridge
                .origin_label
                .unwrap_or_else(|| BridgeOptions::default().origin_label),
            bind_addr: cli
                .bind
                .clone()
                .or(file.control.bind)
                .unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            start_timeout: file
                .control
                .start_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_START_TIMEOUT),
            log_level: cli
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn transformer(&self) -> MessageTransformer {
        MessageTransformer::new(self.marker).with_substitutions(self.substitutions.iter().cloned())
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            origin_label: self.origin_label.clone(),
            game_sender: self.game.username.clone(),
        }
    }
}

/// Load and parse the TOML config file.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
