use crate::config::{DispatchConfig, FileConfig, RunConfig, DEFAULT_WORKERS};
use crate::error::ConfigError;
use crate::matcher::ExtensionSet;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// CLI arguments for tscp
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tscp",
    version,
    about = "Copy files matching a set of extensions to a Tailscale machine",
    long_about = "
Searches the current directory recursively for files with the given
extensions and copies each one to a Tailscale machine with Taildrop,
a few files at a time.

Defaults for the target, extensions and worker count can be kept in
~/.ts-copy/config.toml. The older ~/.ts-copy/config.yaml is no longer
read; move its settings to the TOML file.

EXAMPLES:
  tscp my-server --ext .mp3 --ext .flac
  tscp my-server -e .pdf -e .docx --dry-run
  tscp my-server -e .zip --workers 2
"
)]
pub struct CliArgs {
    /// Name of the Tailscale machine to copy files to
    #[arg(value_name = "TARGET_MACHINE")]
    pub target: Option<String>,

    /// File extension to copy (repeatable)
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Show what would be copied without executing commands
    #[arg(long = "dry-run", visible_alias = "simulate")]
    pub dry_run: bool,

    /// Number of files copied concurrently
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Directory to search instead of the current directory
    #[arg(short = 'C', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Config file to read instead of ~/.ts-copy/config.toml
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Log level
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,
}

/// Log level enumeration
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Show error messages only
    Error,
    /// Show warnings and errors (default)
    Warn,
    /// Show info, warnings, and errors
    Info,
    /// Show debug information
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl CliArgs {
    /// Merge the command line with the config file into a run configuration.
    ///
    /// Command line values win. `cwd` is used as the search root unless
    /// `--dir` was given.
    pub fn resolve(&self, file: &FileConfig, cwd: &Path) -> Result<RunConfig, ConfigError> {
        let target = self
            .target
            .clone()
            .or_else(|| file.target.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingTarget)?;

        let extensions = if self.extensions.is_empty() {
            ExtensionSet::new(&file.extensions)?
        } else {
            ExtensionSet::new(&self.extensions)?
        };

        let workers = self.workers.or(file.workers).unwrap_or(DEFAULT_WORKERS);
        let dispatch = DispatchConfig::new(workers, target, self.dry_run)?;

        let root = match &self.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        };

        Ok(RunConfig {
            root,
            extensions,
            dispatch,
            tailscale: file.tailscale(),
        })
    }

    /// Initialize logging based on CLI arguments. `RUST_LOG` takes
    /// precedence.
    pub fn setup_logging(&self) {
        let level = if self.verbose {
            "debug"
        } else {
            self.log_level.as_str()
        };

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
            )
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .init();
    }
}
