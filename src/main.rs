use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use ts_copy::app::{self, Services};
use ts_copy::cli::CliArgs;
use ts_copy::config::FileConfig;
use ts_copy::dispatcher::BatchReport;
use ts_copy::error::ConfigError;
use ts_copy::tailscale::TailscaleCli;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(app::parse_failure_status(e.kind()));
        }
    };

    args.setup_logging();
    debug!(?args, "Parsed command line");

    match execute(&args).await {
        Ok(report) => {
            if let Some(line) = app::summary_line(&report) {
                println!("{}", line);
            }
            app::exit_code(&report)
        }
        Err(err) => {
            eprintln!("{}", app::failure_message(&err));
            ExitCode::from(app::FATAL_STATUS)
        }
    }
}

async fn execute(args: &CliArgs) -> Result<BatchReport> {
    let file = FileConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let cwd = std::env::current_dir().map_err(ConfigError::WorkingDir)?;
    let config = args.resolve(&file, &cwd)?;

    info!(
        root = %config.root.display(),
        peer = %config.dispatch.target,
        workers = config.dispatch.workers.get(),
        simulate = config.dispatch.simulate,
        "Starting tscp"
    );

    let tailscale = Arc::new(TailscaleCli::new(config.tailscale.clone()));
    let services = Services {
        status: Arc::clone(&tailscale),
        transferrer: tailscale,
    };

    Ok(app::run(&config, &services).await?)
}
