//! Log subscriber installation.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// Output switches for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Install a subscriber at all; when off every record is dropped.
    pub enabled: bool,
    /// JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            json: true,
        }
    }
}

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Returns whether a
/// subscriber was installed; a failure (for instance a subscriber already
/// set) is reported and never aborts start-up.
pub fn init(settings: &LoggingSettings) -> bool {
    if !settings.enabled {
        return false;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = if settings.json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    match installed {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "tracing init failed");
            false
        }
    }
}
