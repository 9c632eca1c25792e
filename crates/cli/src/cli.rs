//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Sensor Stream - concurrent multi-source sensor ingestion
#[derive(Parser, Debug)]
#[command(
    name = "sensor-stream",
    author,
    version,
    about = "Concurrent multi-source sensor ingestion engine",
    long_about = "Pulls readings from many independently paced sensors at once and \n\
                  delivers them either immediately (with per-reading retry and \n\
                  exponential backoff) or in batches released by size or time."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SENSOR_STREAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SENSOR_STREAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion engine
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); the built-in three-sensor demo when omitted
    #[arg(short, long, env = "SENSOR_STREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override delivery mode
    #[arg(long, value_enum, env = "SENSOR_STREAM_MODE")]
    pub mode: Option<ModeArg>,

    /// Override batch size threshold
    #[arg(long, env = "SENSOR_STREAM_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Override batch time threshold in milliseconds
    #[arg(long, env = "SENSOR_STREAM_BATCH_TIMEOUT_MS")]
    pub batch_timeout_ms: Option<u64>,

    /// Override attempts per reading in immediate mode
    #[arg(long, env = "SENSOR_STREAM_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Where readings are emitted
    #[arg(long, value_enum, default_value = "stdout", env = "SENSOR_STREAM_SINK")]
    pub sink: SinkArg,

    /// Output file for the `file` sink
    #[arg(short, long, required_if_eq("sink", "file"))]
    pub output: Option<PathBuf>,

    /// Stop pulling sources after this many seconds (0 = run to exhaustion)
    #[arg(long, default_value = "0", env = "SENSOR_STREAM_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running the engine
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SENSOR_STREAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config/sensors.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/sensors.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed source information
    #[arg(long)]
    pub sources: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Delivery mode override
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Emit each reading as soon as it arrives, with retry
    Immediate,
    /// Emit readings in size/time bounded batches
    Batched,
}

impl From<ModeArg> for contracts::DeliveryMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Immediate => contracts::DeliveryMode::Immediate,
            ModeArg::Batched => contracts::DeliveryMode::Batched,
        }
    }
}

/// Sink selection
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SinkArg {
    /// One line per reading on stdout
    #[default]
    Stdout,
    /// Append lines to `--output`
    File,
    /// Emit readings as log events
    Log,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::try_parse_from([
            "sensor-stream",
            "run",
            "--mode",
            "batched",
            "--batch-size",
            "2",
            "--batch-timeout-ms",
            "250",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.mode, Some(ModeArg::Batched));
        assert_eq!(args.batch_size, Some(2));
        assert_eq!(args.batch_timeout_ms, Some(250));
        assert_eq!(args.sink, SinkArg::Stdout);
    }

    #[test]
    fn test_file_sink_requires_output() {
        let result = Cli::try_parse_from(["sensor-stream", "run", "--sink", "file"]);
        assert!(result.is_err());
    }
}
