//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::StreamConfig;
use serde::Serialize;
use tracing::info;

use super::run::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    engine: EngineInfo,
    source_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceInfo>,
}

#[derive(Serialize)]
struct EngineInfo {
    mode: String,
    max_retries: u32,
    backoff_base_ms: u64,
    batch_size: usize,
    batch_timeout_ms: u64,
}

#[derive(Serialize)]
struct SourceInfo {
    device_id: String,
    delay_ms: u64,
    count: usize,
    base_value: f64,
    step: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_after: Option<usize>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(Some(args.config.as_path()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &StreamConfig, args: &InfoArgs) -> ConfigInfo {
    let sources = if args.sources {
        config
            .sources
            .iter()
            .map(|s| SourceInfo {
                device_id: s.device_id.clone(),
                delay_ms: s.delay_ms,
                count: s.count,
                base_value: s.base_value,
                step: s.step,
                fail_after: s.fail_after,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        engine: EngineInfo {
            mode: format!("{:?}", config.engine.mode),
            max_retries: config.engine.retry.max_retries,
            backoff_base_ms: config.engine.retry.backoff_base_ms,
            batch_size: config.engine.batch.batch_size,
            batch_timeout_ms: config.engine.batch.batch_timeout_ms,
        },
        source_count: config.sources.len(),
        sources,
    }
}

fn print_config_info(config: &StreamConfig, args: &InfoArgs) {
    println!("=== Sensor Stream Configuration ===\n");

    let engine = &config.engine;
    println!("Engine");
    println!("   ├─ Mode: {:?}", engine.mode);
    println!(
        "   ├─ Retry: {} attempts, backoff {}ms x 2^n",
        engine.retry.max_retries, engine.retry.backoff_base_ms
    );
    println!(
        "   └─ Batch: size {}, timeout {}ms",
        engine.batch.batch_size, engine.batch.batch_timeout_ms
    );

    println!("\nSources ({})", config.sources.len());
    for (i, source) in config.sources.iter().enumerate() {
        let prefix = if i == config.sources.len() - 1 {
            "└─"
        } else {
            "├─"
        };

        if args.sources {
            println!(
                "   {} {}: {} readings every {}ms, {} + i * {}{}",
                prefix,
                source.device_id,
                source.count,
                source.delay_ms,
                source.base_value,
                source.step,
                source
                    .fail_after
                    .map(|n| format!(", fails after {n}"))
                    .unwrap_or_default()
            );
        } else {
            println!("   {} {}", prefix, source.device_id);
        }
    }

    println!();
}
