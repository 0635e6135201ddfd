//! Shared, explicitly-passed server state (replaces the global mutable
//! singleton pattern spec.md §9 flags — every component that needs
//! configuration or the session registry takes an `Arc<ServerContext>`
//! rather than reaching for a static).

use std::sync::Arc;

use voxbridge_realtime_client::SessionConfig;

use crate::bridge::Bridge;
use crate::registry::SessionRegistry;

/// Bridge-wide configuration, independent of any one call.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub realtime_peer_url: String,
    pub realtime_peer_api_key: String,
    pub default_session: SessionConfig,
    pub commit_threshold_ms: u32,
    /// Pause applied to `response.create` after a `rate_limit_error`
    /// (spec.md §12's supplemented rate-limit backoff).
    pub rate_limit_backoff: std::time::Duration,
    /// Idle read timeout on the realtime peer socket (spec.md §5).
    pub ai_peer_idle_timeout: std::time::Duration,
    /// Per-invocation budget for a registered tool (spec.md §5).
    pub tool_call_timeout: std::time::Duration,
}

/// Everything a [`Bridge`] needs beyond its own call id: configuration and
/// the registry it should (un)register itself with.
pub struct ServerContext {
    pub config: BridgeConfig,
    pub registry: SessionRegistry<Bridge>,
}

impl ServerContext {
    pub fn new(config: BridgeConfig) -> Arc<Self> {
        Arc::new(Self { config, registry: SessionRegistry::new() })
    }
}
