//! `validate` command implementation.

use std::collections::HashSet;

use anyhow::{Context, Result};
use contracts::StreamConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    mode: String,
    source_count: usize,
    total_readings: usize,
    max_retries: u32,
    batch_size: usize,
    batch_timeout_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    mode: format!("{:?}", config.engine.mode),
                    source_count: config.sources.len(),
                    total_readings: config.sources.iter().map(|s| s.count).sum(),
                    max_retries: config.engine.retry.max_retries,
                    batch_size: config.engine.batch.batch_size,
                    batch_timeout_ms: config.engine.batch.batch_timeout_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &StreamConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sources.is_empty() {
        warnings.push("No sources configured - the run will emit nothing".to_string());
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.device_id.as_str()) {
            warnings.push(format!(
                "Device id '{}' is used by more than one source",
                source.device_id
            ));
        }
        if source.count == 0 {
            warnings.push(format!("Source '{}' produces no readings", source.device_id));
        }
        if let Some(n) = source.fail_after {
            warnings.push(format!(
                "Source '{}' is set to fail after {} readings",
                source.device_id, n
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Mode: {}", summary.mode);
            println!("  Sources: {}", summary.source_count);
            println!("  Total readings: {}", summary.total_readings);
            println!("  Max retries: {}", summary.max_retries);
            println!(
                "  Batch: size {}, timeout {}ms",
                summary.batch_size, summary.batch_timeout_ms
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
