//! `tailscale` CLI adapter for status queries and Taildrop copies

use crate::config::TailscaleConfig;
use crate::error::{PreflightError, TransferError};
use crate::preflight::{PeerStatusSnapshot, StatusSource};
use crate::transfer::{destination, Transferrer};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};

/// Talks to the local tailscale daemon through its command line client
#[derive(Debug, Clone)]
pub struct TailscaleCli {
    config: TailscaleConfig,
}

impl TailscaleCli {
    pub fn new(config: TailscaleConfig) -> Self {
        Self { config }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = if self.config.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.config.binary);
            cmd
        } else {
            Command::new(&self.config.binary)
        };
        cmd.args(args).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl StatusSource for TailscaleCli {
    async fn fetch_status(&self) -> Result<PeerStatusSnapshot, PreflightError> {
        debug!(binary = %self.config.binary.display(), "Querying tailscale status");

        let output = self
            .command(["status", "--json"])
            .output()
            .await
            .map_err(|e| PreflightError::Query {
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PreflightError::Query {
                reason: describe_failure(&output),
            });
        }

        PeerStatusSnapshot::from_json(&output.stdout)
    }
}

#[async_trait]
impl Transferrer for TailscaleCli {
    async fn transfer(&self, path: &Path, target: &str) -> Result<(), TransferError> {
        let output = self
            .command([OsStr::new("file"), OsStr::new("cp")])
            .arg(path)
            .arg(destination(target))
            .output()
            .await
            .map_err(|e| TransferError::new(path, e.to_string()))?;

        if output.status.success() {
            return Ok(());
        }

        let diagnostic = describe_failure(&output);
        warn!(path = %path.display(), %diagnostic, "tailscale file cp failed");
        Err(TransferError::new(path, diagnostic))
    }
}

/// Combined stdout and stderr of a failed command, or its exit status when
/// it printed nothing
fn describe_failure(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let combined = [stdout.trim(), stderr.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    if combined.is_empty() {
        output.status.to_string()
    } else {
        combined
    }
}
