use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Realtime message relay server
#[derive(Parser, Serialize, Clone, Debug)]
#[command(name = "relay-server", version, about = "Realtime message relay server")]
pub struct Cli {
    /// Port to listen on (WebSocket and health endpoint) [default: 8080]
    #[arg(long, env = "RELAY_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "RELAY_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./relay.toml")]
    pub config: String,

    /// Enable structured JSON logging
    #[arg(long, env = "RELAY_JSON_LOGS")]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,
}

/// Effective server configuration after all layers are merged.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub config: String,
    pub json_logs: bool,
    pub generate_config: bool,

    /// Channel log retention ([retention] section in TOML)
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Per-connection settings ([connections] section in TOML)
    #[serde(default)]
    pub connections: ConnectionsConfig,
}

/// Bounds on the in-memory channel logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Messages kept per channel or group, oldest dropped first (0 = unlimited)
    #[serde(default = "default_max_messages")]
    pub max_messages_per_channel: usize,

    /// Age in seconds after which messages are purged (0 = never)
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Interval in seconds between purge runs
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_messages_per_channel: 500,
            max_age_secs: 86400,
            cleanup_interval_secs: 3600,
        }
    }
}

fn default_max_messages() -> usize {
    500
}

fn default_max_age() -> u64 {
    86400
}

fn default_cleanup_interval() -> u64 {
    3600
}

/// Settings applied to every WebSocket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsConfig {
    /// Frames buffered per connection before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Seconds between server pings
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./relay.toml".to_string(),
            json_logs: false,
            generate_config: false,
            retention: RetentionConfig::default(),
            connections: ConnectionsConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (RELAY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(Cli::parse()).extract()
    }

    fn figment(cli: Cli) -> Figment {
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("RELAY_").split("__"))
            .merge(Serialized::defaults(cli))
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Relay Server Configuration
# Place this file at ./relay.toml or specify with --config <path>
# All settings can be overridden via environment variables (RELAY_PORT,
# RELAY_RETENTION__MAX_AGE_SECS, etc.) or CLI flags (--port, etc.)

# Port for WebSocket connections and the /health endpoint (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging
# json_logs = false

# ---- Channel Log Retention ----
# [retention]

# Messages kept per direct channel or group; oldest dropped first (0 = unlimited)
# max_messages_per_channel = 500

# Purge messages older than this many seconds (0 = never, default: 86400)
# max_age_secs = 86400

# Seconds between purge runs (default: 3600)
# cleanup_interval_secs = 3600

# ---- Connections ----
# [connections]

# Frames buffered per connection; further frames are dropped while full
# outbound_queue_capacity = 256

# Server ping interval and pong deadline in seconds
# ping_interval_secs = 30
# pong_timeout_secs = 10
"#
    .to_string()
}
