use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, info, warn};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

mod cli;
mod config;

use cli::Cli;
use config::Config;
use stacktop::domain::RunConfig;
use stacktop::runner::run_session;
use stacktop::terminal;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stacktop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("stacktop.log");

    // The terminal belongs to the view, so logs go to a file
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // Everything passes until the config file has been read
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Narrow logging to the configured level. `RUST_LOG` wins when set.
fn apply_log_level(level: Option<&str>, verbose: bool) {
    if env::var_os("RUST_LOG").is_some() {
        return;
    }
    let level = if verbose {
        LevelFilter::Debug
    } else {
        level.and_then(|l| l.parse().ok()).unwrap_or(LevelFilter::Info)
    };
    log::set_max_level(level);
}

async fn run_application(run_config: RunConfig) -> Result<i32> {
    info!("Starting with {:?}", run_config);

    let outcome = run_session(run_config, io::stdout())
        .await
        .context("Monitoring failed")?;
    info!("Finished: {:?}", outcome);
    Ok(outcome.exit_code())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments; --help and --version exit here with status 0
    let cli = Cli::parse();

    setup_logging().context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(config.log_level.as_deref(), cli.is_verbose());
    info!("Starting with config from: {:?}", cli.config);

    let run_config = match cli.to_run_config(&config, terminal::stdout_is_tty()) {
        Ok(run_config) => run_config,
        Err(e) => {
            warn!("Invalid arguments: {}", e);
            Cli::usage_error(&e).exit()
        }
    };

    match run_application(run_config).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let mut stdout = io::stdout();
            let _ = writeln!(stdout, "\n{}", "ERROR: stacktop stopped unexpectedly".red());
            let _ = writeln!(stdout, "{:?}", e);
            let _ = stdout.flush();
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_level_applies_after_logger_setup() {
        if env::var_os("RUST_LOG").is_some() {
            return;
        }
        apply_log_level(Some("warn"), false);
        assert_eq!(log::max_level(), LevelFilter::Warn);
        apply_log_level(Some("warn"), true);
        assert_eq!(log::max_level(), LevelFilter::Debug);
        apply_log_level(Some("nonsense"), false);
        assert_eq!(log::max_level(), LevelFilter::Info);
    }
}
