//! CLI/env surface and the `ServerConfig` it builds (spec.md §6.5, §11.3).
//!
//! Grounded on `crates/mcp-server/Cargo.toml`'s `clap` feature set
//! (`derive` + `env`), letting flags and environment variables resolve to
//! the same field without a separate parsing pass.

use std::time::Duration;

use clap::Parser;
use voxbridge_core::BridgeConfig;
use voxbridge_realtime_client::{SessionConfig, ToolChoice, TurnDetection};

/// Command-line flags, each falling back to an environment variable of the
/// same name in upper case (spec.md §6.5).
#[derive(Debug, Parser)]
#[command(name = "voxbridge-server", about = "Realtime voice bridge server")]
pub struct Cli {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Everything the server needs once flags, env vars and defaults have been
/// resolved. Constructed once at startup and handed to every [`Bridge`]
/// via a shared [`voxbridge_core::ServerContext`] (spec.md §9's
/// "global mutable singletons → per-server context" redesign point).
///
/// [`Bridge`]: voxbridge_core::Bridge
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub bridge: BridgeConfig,
}

/// Missing or invalid startup configuration. Always fatal (exit code 1 —
/// spec.md §6.5).
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("AI_PEER_API_KEY environment variable is required")]
    MissingApiKey,
}

impl ServerConfig {
    /// Resolve CLI flags plus the environment into a `ServerConfig`. The
    /// realtime peer's API key has no CLI flag by design (spec.md §6.5
    /// names it as environment-only) and its absence is the one startup
    /// condition this function reports rather than panics on.
    pub fn from_cli(cli: Cli) -> Result<Self, StartupError> {
        let api_key = std::env::var("AI_PEER_API_KEY").map_err(|_| StartupError::MissingApiKey)?;
        let realtime_peer_url = std::env::var("AI_PEER_URL")
            .unwrap_or_else(|_| "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview".to_string());

        Ok(Self {
            host: cli.host,
            port: cli.port,
            log_level: cli.log_level,
            bridge: BridgeConfig {
                realtime_peer_url,
                realtime_peer_api_key: api_key,
                default_session: default_session_config(),
                commit_threshold_ms: 100,
                rate_limit_backoff: Duration::from_secs(2),
                ai_peer_idle_timeout: Duration::from_secs(60),
                tool_call_timeout: Duration::from_secs(30),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_session_config() -> SessionConfig {
    SessionConfig {
        model: "gpt-4o-realtime-preview".into(),
        instructions: "You are a helpful voice assistant.".into(),
        voice: "alloy".into(),
        temperature: 0.8,
        turn_detection: TurnDetection::ServerVad { threshold: 0.5, prefix_padding_ms: 300, silence_duration_ms: 500 },
        tool_choice: ToolChoice::Auto,
        tools: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_joins_host_and_port() {
        let cfg = ServerConfig {
            host: "127.0.0.1".into(),
            port: 9000,
            log_level: "info".into(),
            bridge: BridgeConfig {
                realtime_peer_url: "wss://example.invalid".into(),
                realtime_peer_api_key: "k".into(),
                default_session: default_session_config(),
                commit_threshold_ms: 100,
                rate_limit_backoff: Duration::from_secs(2),
                ai_peer_idle_timeout: Duration::from_secs(60),
                tool_call_timeout: Duration::from_secs(30),
            },
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
    }
}
