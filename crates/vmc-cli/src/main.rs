//! `vmc`: run one controller command, or a channel scan, and print the
//! result as JSON.
//!
//! Replies go to stdout. Failures print an error report to stderr and exit
//! non-zero: 1 for controller and link errors, 2 for configuration errors.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use vmc_driver::{
    timeout_from_millis, ConfigError, ControllerConfig, ControllerError, VendingController,
};

use crate::cli::{Action, Cli};

/// Errors that end the process.
#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Controller(_) => ExitCode::from(1),
            CliError::Config(_) | CliError::Json(_) => ExitCode::from(2),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<ControllerConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    cli.apply_link_overrides(&mut config);
    Ok(config)
}

async fn run(cli: Cli) -> Result<String, CliError> {
    let config = load_config(&cli)?;
    let action = cli
        .command
        .action(config.poll_options()?)
        .map_err(ControllerError::from)?;
    let explicit_timeout = cli.timeout_ms.map(timeout_from_millis).transpose()?;

    debug!(link = ?config.link, ?action, "starting");
    let controller = VendingController::with_timeouts(config.link.build(), config.timeout_table()?);
    controller.open()?;

    let output = match action {
        Action::Execute(command) => {
            let reply = match explicit_timeout {
                Some(timeout) => controller.execute_with_timeout(command, timeout).await,
                None => controller.execute(command).await,
            };
            reply.map(|reply| serde_json::to_string_pretty(&reply))
        }
        Action::Poll(mut options) => {
            if let Some(timeout) = explicit_timeout {
                options.per_request_timeout = timeout;
            }
            controller
                .poll_channels(options)
                .await
                .map(|probes| serde_json::to_string_pretty(&probes))
        }
    };

    controller.close()?;
    Ok(output??)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    vmc_metrics::describe_metrics();

    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(CliError::Controller(err)) => {
            let report = err.report();
            match serde_json::to_string_pretty(&report) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{}: {}", report.code, report.detail),
            }
            ExitCode::from(1)
        }
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vmc").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_read() {
        let output = run(cli(&["--simulate", "read-temperature"])).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["kind"], "temperature");
        assert_eq!(json["celsius"], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_vend_fault_free() {
        let output = run(cli(&["--simulate", "vend-drop-check", "3"])).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["kind"], "vend");
        assert_eq!(json["channel"], 3);
        assert_eq!(json["dropped"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_poll() {
        let output = run(cli(&["--simulate", "poll", "--max-channel", "62", "--delay-ms", "0"]))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        let probes = json.as_array().unwrap();
        assert_eq!(probes.len(), 62);
        assert_eq!(probes[59]["exists"], true);
        assert_eq!(probes[60]["exists"], false);
        assert_eq!(probes[60]["outcome"], "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_channel() {
        let err = run(cli(&["--simulate", "vend", "99"])).await.unwrap_err();
        match err {
            CliError::Controller(err) => {
                assert_eq!(err.code(), vmc_driver::ErrorCode::InvalidArgument)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_timeout() {
        let err = run(cli(&["--simulate", "--timeout-ms", "0", "read-door"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Controller(ControllerError::InvalidTimeout { .. })
        ));

        let err = run(cli(&["--simulate", "--timeout-ms", "1e300", "read-door"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Controller(ControllerError::InvalidTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let err = run(cli(&["--config", "/nonexistent/vmc.yaml", "read-door"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Io(_))));
    }
}
