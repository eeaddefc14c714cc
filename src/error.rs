use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a run before any file is dispatched
#[derive(Error, Debug)]
pub enum TscpError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Preflight(#[from] PreflightError),
}

/// Configuration and usage errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Target machine is required as the first argument")]
    MissingTarget,

    #[error("At least one file extension must be specified using --ext or -e flag")]
    NoExtensions,

    #[error("Invalid file extension '{extension}'")]
    InvalidExtension { extension: String },

    #[error("Worker count must be greater than 0")]
    ZeroWorkers,

    #[error("Config file not found at {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Error getting current directory: {0}")]
    WorkingDir(#[source] std::io::Error),
}

impl ConfigError {
    /// Whether the error should be followed by the usage summary
    pub fn is_usage(&self) -> bool {
        matches!(self, ConfigError::MissingTarget | ConfigError::NoExtensions)
    }
}

/// Directory traversal errors. Any of these discards partial results.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Error walking directory {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Directory walk interrupted: {0}")]
    Interrupted(String),
}

/// Reasons the target peer failed the reachability check
#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("failed to get tailscale status: {reason}")]
    Query { reason: String },

    #[error("failed to parse tailscale status: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot copy to self (target machine '{target}' is the current machine)")]
    SelfTarget { target: String },

    #[error("target machine '{target}' not found in tailscale network")]
    UnknownPeer { target: String },

    #[error("target machine '{target}' is offline")]
    Offline { target: String },
}

/// A single failed transfer. Reported as a value, never fatal to the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error copying {}: {diagnostic}", path.display())]
pub struct TransferError {
    pub path: PathBuf,
    pub diagnostic: String,
}

impl TransferError {
    pub fn new(path: impl Into<PathBuf>, diagnostic: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            diagnostic: diagnostic.into(),
        }
    }
}

/// Convenience Result type with TscpError
pub type Result<T> = std::result::Result<T, TscpError>;
