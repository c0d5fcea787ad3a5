//! submux - soft-mux subtitles into videos with ffmpeg
//!
//! Entry point: parse options, set up logging, load configuration and run
//! the workflow over every resolved video/subtitle pair.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use submux::cli::Args;
use submux::config::Config;
use submux::options::{Options, Verbosity};
use submux::workflow::{RunStatus, Workflow};

const DEFAULT_CONFIG_FILE: &str = "submux.toml";

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
// Same code clap uses for usage errors
const EXIT_ARGUMENTS: u8 = 2;
// 128 + SIGINT
const EXIT_INTERRUPTED: u8 = 130;

/// Why an invocation did not finish its batch
#[derive(Debug)]
enum Failure {
    Arguments(submux::error::MuxError),
    Fatal(anyhow::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    let (result, silent) = match Options::try_from(&args) {
        Ok(options) => {
            let silent = options.is_silent();
            (run(args.config.as_deref(), options).await.map_err(Failure::Fatal), silent)
        }
        Err(e) => (Err(Failure::Arguments(e)), false),
    };

    match &result {
        Err(Failure::Arguments(e)) => eprintln!("error: {}", e),
        Err(Failure::Fatal(e)) if !silent => eprintln!("error: {:#}", e),
        _ => {}
    }

    ExitCode::from(exit_code(&result))
}

fn exit_code(result: &std::result::Result<RunStatus, Failure>) -> u8 {
    match result {
        Ok(RunStatus::Success) => EXIT_SUCCESS,
        Ok(RunStatus::JobsFailed) => EXIT_FAILURE,
        Ok(RunStatus::Interrupted) => EXIT_INTERRUPTED,
        Err(Failure::Arguments(_)) => EXIT_ARGUMENTS,
        Err(Failure::Fatal(_)) => EXIT_FAILURE,
    }
}

async fn run(config_path: Option<&Path>, options: Options) -> Result<RunStatus> {
    let config = load_config(config_path)?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = setup_logging(options.verbosity, config.logging.directory.as_deref())?;
    info!("Starting submux");

    let mut workflow = Workflow::new(config, options);
    let report = workflow.run().await?;

    Ok(report.status())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            if local.exists() {
                Config::from_file(&local)?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

/// Console logging on stderr, plus a daily log file when a directory is configured
fn setup_logging(verbosity: Verbosity, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let log_level = match verbosity {
        Verbosity::Silent => LevelFilter::OFF,
        Verbosity::Verbose => LevelFilter::DEBUG,
        Verbosity::Normal => LevelFilter::INFO,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = rolling::daily(dir, "submux.log");
            let (non_blocking_file, guard) = non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_target(false)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(log_filter(log_level, rust_log.as_deref()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(guard)
}

/// RUST_LOG directives on top of the verbosity level; --silent ignores them
fn log_filter(level: LevelFilter, rust_log: Option<&str>) -> EnvFilter {
    if level == LevelFilter::OFF {
        return EnvFilter::new("off");
    }
    EnvFilter::new(rust_log.unwrap_or_default()).add_directive(level.into())
}
