use anyhow::Result;
use clap::Parser;

use sysevent_core::config::DaemonConfig;
use sysevent_daemon::cli::DaemonCli;
use sysevent_daemon::logging::init_tracing;
use sysevent_daemon::orchestrator::{Orchestrator, sysevent_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = DaemonConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {e}", cli.config.display()))?;

    // CLI flags take precedence over file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

    if cli.validate {
        let sysevent = sysevent_config(&config)?;
        println!(
            "configuration is valid: listen={:?} buffer_size={} buffer_length={} filters={}",
            sysevent.listen(),
            sysevent.buffer_size,
            sysevent.buffer_length,
            sysevent.regex_filters.len()
        );
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sysevent-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}
