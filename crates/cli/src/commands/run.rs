//! `run` command implementation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{SourceConfig, StreamConfig};
use dispatcher::{ConfiguredSink, SinkKind};
use engine::StreamEngine;
use ingestion::SimulatedSensor;
use tracing::{info, warn};

use crate::cli::{RunArgs, SinkArg};

/// Execute the `run` command
pub async fn run_stream(args: &RunArgs, quiet: bool) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        mode = ?config.engine.mode,
        sources = config.sources.len(),
        max_retries = config.engine.retry.max_retries,
        batch_size = config.engine.batch.batch_size,
        batch_timeout_ms = config.engine.batch.batch_timeout_ms,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let kind = sink_kind(args)?;
    let sink = ConfiguredSink::create("output", &kind)
        .await
        .context("Failed to create sink")?;

    let sources = SimulatedSensor::from_configs(&config.sources);
    let engine = StreamEngine::new(config.engine.clone());

    // Cancel on Ctrl-C / SIGTERM / --timeout. The engine then drains what it already has.
    let cancel = engine.cancel_token();
    let timeout = (args.timeout != 0).then(|| Duration::from_secs(args.timeout));
    let watcher = tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => warn!("Received shutdown signal, draining..."),
            _ = run_timeout(timeout) => warn!("Run timed out, draining..."),
        }
        cancel.cancel();
    });

    info!("Starting engine...");
    let result = engine.run(sources, sink).await;
    watcher.abort();
    let report = result.context("Engine run failed")?;

    info!(
        delivered = report.delivered,
        abandoned = report.abandoned,
        duration_secs = report.elapsed.as_secs_f64(),
        "Engine completed"
    );
    if !quiet {
        report.print_summary();
    }

    Ok(())
}

/// Load the configuration file, or the built-in demo when no path is given
pub(crate) fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    let Some(path) = path else {
        info!("No configuration file given, using the built-in demo sensors");
        return Ok(demo_config());
    };

    info!(config = %path.display(), "Loading configuration");
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Three sensors paced at 0.3s, 0.5s and 0.4s, five readings each
pub(crate) fn demo_config() -> StreamConfig {
    StreamConfig {
        sources: vec![
            SourceConfig::new("sensor_1", Duration::from_millis(300)),
            SourceConfig::new("sensor_2", Duration::from_millis(500)),
            SourceConfig::new("sensor_3", Duration::from_millis(400)),
        ],
        ..Default::default()
    }
}

fn apply_overrides(config: &mut StreamConfig, args: &RunArgs) {
    if let Some(mode) = args.mode {
        info!(mode = ?mode, "Overriding delivery mode from CLI");
        config.engine.mode = mode.into();
    }
    if let Some(batch_size) = args.batch_size {
        info!(batch_size, "Overriding batch size from CLI");
        config.engine.batch.batch_size = batch_size;
    }
    if let Some(batch_timeout_ms) = args.batch_timeout_ms {
        info!(batch_timeout_ms, "Overriding batch timeout from CLI");
        config.engine.batch.batch_timeout_ms = batch_timeout_ms;
    }
    if let Some(max_retries) = args.max_retries {
        info!(max_retries, "Overriding max retries from CLI");
        config.engine.retry.max_retries = max_retries;
    }
}

fn sink_kind(args: &RunArgs) -> Result<SinkKind> {
    Ok(match args.sink {
        SinkArg::Stdout => SinkKind::Stdout,
        SinkArg::Log => SinkKind::Log,
        SinkArg::File => {
            let path = args
                .output
                .clone()
                .context("--output is required for the file sink")?;
            SinkKind::File(path)
        }
    })
}

async fn run_timeout(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &StreamConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Engine:");
    println!("  Mode: {:?}", config.engine.mode);
    println!(
        "  Retry: {} attempts, backoff base {}ms",
        config.engine.retry.max_retries, config.engine.retry.backoff_base_ms
    );
    println!(
        "  Batch: size {}, timeout {}ms",
        config.engine.batch.batch_size, config.engine.batch.batch_timeout_ms
    );

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!(
            "  - {} ({} readings, every {}ms)",
            source.device_id, source.count, source.delay_ms
        );
    }

    println!();
}
