use serde::Deserialize;
use tracing::{info, warn};

use centavo_core::{FeePolicy, GatewayConfig, Limits, RetryPolicy};

/// Top-level configuration: fee schedule, limits, retry budget and
/// gateway tuning. Every field has a sane default; a JSON file pointed to
/// by `CENTAVO_CONFIG` overrides selectively.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fees: FeePolicy,
    pub limits: Limits,
    pub retry: RetryPolicy,
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Load configuration from the file named by `CENTAVO_CONFIG`, falling
    /// back to defaults when the variable is unset. A present-but-broken
    /// config file is an error, not a silent fallback.
    pub fn load() -> anyhow::Result<Self> {
        let Some(path) = std::env::var_os("CENTAVO_CONFIG") else {
            info!("CENTAVO_CONFIG not set, using default configuration");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&raw)?;
        if config.gateway.webhook_secret.is_empty() {
            warn!("webhook secret is empty, gateway webhooks will be rejected");
        }
        info!(path = %path.to_string_lossy(), "configuration loaded");
        Ok(config)
    }
}
