//! Logging setup and pool counters.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::app::config::{LogFormat, LoggingConfig};

/// Activity counters of the in-process worker pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub coalesced: usize,
    pub replaced: usize,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match config.format {
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => builder.with_target(true).try_init(),
    };
}
