//! End-to-end run: discovery, preflight, dispatch

use crate::cli::CliArgs;
use crate::config::RunConfig;
use crate::discovery;
use crate::dispatcher::{BatchReport, Completion, Dispatcher, Job};
use crate::error::{ConfigError, Result, TscpError};
use clap::error::ErrorKind;
use clap::CommandFactory;
use crate::preflight::{self, StatusSource};
use crate::transfer::Transferrer;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Collaborators a run talks to
pub struct Services<S: ?Sized, T: ?Sized> {
    pub status: Arc<S>,
    pub transferrer: Arc<T>,
}

impl<S: ?Sized, T: ?Sized> Clone for Services<S, T> {
    fn clone(&self) -> Self {
        Self {
            status: Arc::clone(&self.status),
            transferrer: Arc::clone(&self.transferrer),
        }
    }
}

/// Discover matching files, check the target (unless simulating) and
/// transfer everything.
///
/// Returns an error only for fatal preconditions; per-file failures are
/// counted in the report.
pub async fn run<S, T>(config: &RunConfig, services: &Services<S, T>) -> Result<BatchReport>
where
    S: StatusSource + ?Sized,
    T: Transferrer + ?Sized + 'static,
{
    println!("Searching for files in: {}", config.root.display());

    let files = discovery::discover_blocking(config.root.clone(), config.extensions.clone()).await?;
    println!("Found {} matching files", files.len());

    let target = &config.dispatch.target;
    if config.dispatch.simulate {
        info!(peer = %target, "Simulation mode, skipping preflight check");
    } else {
        println!("Checking if target machine '{}' is online...", target);
        preflight::check_reachable(services.status.as_ref(), target).await?;
        println!("Target machine '{}' is online and ready", target);
    }

    let jobs: Vec<Job> = files.into_iter().map(Job::from).collect();
    let dispatcher = Dispatcher::new(Arc::clone(&services.transferrer));
    Ok(dispatcher.run(jobs, &config.dispatch).await)
}

/// Final line printed for a finished batch. Nothing is printed when every
/// job failed.
pub fn summary_line(report: &BatchReport) -> Option<String> {
    match report.completion() {
        Completion::AllSucceeded => Some("All files processed successfully".to_string()),
        Completion::Partial { failed } => Some(format!("Completed with {} error(s)", failed)),
        Completion::AllFailed { .. } => None,
    }
}

/// Process exit status for a finished batch: 0 only when nothing failed
pub fn exit_status(report: &BatchReport) -> u8 {
    if report.is_success() {
        0
    } else {
        1
    }
}

pub fn exit_code(report: &BatchReport) -> ExitCode {
    ExitCode::from(exit_status(report))
}

/// Process exit status when the command line cannot be parsed. Help and
/// version requests are not failures.
pub fn parse_failure_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

/// Whether a fatal error was a usage mistake that deserves the help screen
pub fn is_usage_error(err: &anyhow::Error) -> bool {
    if let Some(config) = err.downcast_ref::<ConfigError>() {
        return config.is_usage();
    }
    matches!(err.downcast_ref::<TscpError>(), Some(TscpError::Config(config)) if config.is_usage())
}

/// Text written to stderr when a run aborts: the error chain, followed by
/// the help screen for usage mistakes.
pub fn failure_message(err: &anyhow::Error) -> String {
    let mut message = format!("Error: {:#}", err);
    if is_usage_error(err) {
        message.push_str("\n\n");
        message.push_str(&CliArgs::command().render_help().to_string());
    }
    message
}

/// Process exit status for a run that aborted before producing a report
pub const FATAL_STATUS: u8 = 1;
