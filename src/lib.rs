//! ts-copy
//!
//! Finds files by extension and copies them to a Tailscale peer with a
//! bounded pool of concurrent workers.

pub mod app;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod matcher;
pub mod preflight;
pub mod tailscale;
pub mod transfer;

pub use config::{DispatchConfig, RunConfig};
pub use error::{Result, TscpError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        app::{run, Services},
        config::{DispatchConfig, FileConfig, RunConfig, TailscaleConfig},
        dispatcher::{BatchReport, Completion, Dispatcher, Job, TransferOutcome},
        error::{ConfigError, DiscoveryError, PreflightError, Result, TransferError, TscpError},
        matcher::ExtensionSet,
        preflight::{PeerStatusSnapshot, StatusSource},
        tailscale::TailscaleCli,
        transfer::Transferrer,
    };

    pub use tracing::{debug, error, info, warn};
}
