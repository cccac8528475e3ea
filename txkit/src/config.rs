//! Service configuration loaded via OrthoConfig.
//!
//! Every field can come from `TXKIT_*` environment variables, a config file
//! or command-line flags.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::outbound::persistence::PoolConfig;
use crate::telemetry::LoggingSettings;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_POOL_MIN_IDLE: u32 = 2;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Runtime settings for the service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TXKIT")]
pub struct Settings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Cap on pooled connections.
    pub pool_max_size: Option<u32>,
    /// Connections kept open while idle.
    pub pool_min_idle: Option<u32>,
    /// Seconds a connection checkout may wait.
    pub connection_timeout_secs: Option<u64>,
    /// Per-request time budget in milliseconds; unbounded when unset.
    pub request_timeout_ms: Option<u64>,
    /// Listen address.
    pub bind_addr: Option<String>,
    /// Install a log subscriber; on when unset.
    pub log_enabled: Option<bool>,
    /// Emit logs as JSON rather than text; on when unset.
    pub log_json: Option<bool>,
}

impl Settings {
    /// Listen address, `0.0.0.0:8080` by default.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Pool configuration, if a database URL is set.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        let url = self.database_url.as_deref()?;
        let timeout = self
            .connection_timeout_secs
            .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);
        Some(
            PoolConfig::new(url)
                .with_max_size(self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE))
                .with_min_idle(Some(self.pool_min_idle.unwrap_or(DEFAULT_POOL_MIN_IDLE)))
                .with_connection_timeout(Duration::from_secs(timeout)),
        )
    }

    /// Per-request time budget.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Logging switches.
    pub fn logging(&self) -> LoggingSettings {
        LoggingSettings {
            enabled: self.log_enabled.unwrap_or(true),
            json: self.log_json.unwrap_or(true),
        }
    }
}
