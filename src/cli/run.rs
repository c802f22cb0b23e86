use super::config::SnovConfig;
use super::service::{build_engine, init_logging};
use snov::gatekeeper::{SweepScheduler, Sweeper};
use std::sync::Arc;
use tracing::{error, info};

/// Run the verification daemon
///
/// Loads (or creates) the configuration, opens the record database, and
/// re-validates every verified owner on the configured interval until
/// Ctrl-C. Chat transports attach through the library's `ComplianceBot`;
/// the standalone daemon logs privilege changes instead.
pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, config_path) = SnovConfig::load_or_create(config_path)?;
    init_logging(&config.logging.level);

    println!("🚀 Starting SNOV daemon...");
    println!("Config: {}", config_path.display());
    println!("Database: {}", config.store.database_path.display());
    println!("Network: {}", config.network.name);
    println!();

    let engine = Arc::new(build_engine(&config).await?);
    let interval = config.sweep_interval()?;

    if config.sweep.run_on_start {
        match engine.sweep().await {
            Ok(report) => info!(
                checked = report.checked,
                revoked = report.revoked.len(),
                errors = report.errors.len(),
                "startup sweep complete"
            ),
            Err(e) => error!(error = %e, "startup sweep failed"),
        }
    }

    let sweeper: Arc<dyn Sweeper> = engine.clone();
    let scheduler = SweepScheduler::start(sweeper, interval);
    println!(
        "✅ Sweeping every {} (Ctrl-C to stop)",
        humantime::format_duration(interval)
    );

    tokio::signal::ctrl_c().await?;
    println!();
    println!("Shutting down...");
    scheduler.stop().await;

    Ok(())
}
