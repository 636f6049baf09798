//! TSM Scanner - F&O signal scanning service.
//!
//! Serves the intraday breakout scanner and the PCR storm detector over
//! HTTP, and optionally runs the storm scan during the opening window.

use anyhow::Result;
use tsm_common::config::Config;
use tsm_common::logging::init_logging_with_exclusions;
use tsm_scanner::ScannerService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_and_validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("TSM Scanner v{}", env!("CARGO_PKG_VERSION"));

    let service = ScannerService::new(config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
