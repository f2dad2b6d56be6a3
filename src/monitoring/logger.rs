use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::MonitoringConfig;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &MonitoringConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
