//! Boundary to the peer-copy operation

use crate::error::TransferError;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Performs the actual copy of one file to a peer.
///
/// Implementations report every failure as a [`TransferError`] value so the
/// caller can keep going with other files.
#[async_trait]
pub trait Transferrer: Send + Sync {
    async fn transfer(&self, path: &Path, target: &str) -> Result<(), TransferError>;
}

/// Destination argument for a peer copy, e.g. `nas:`
pub fn destination(target: &str) -> String {
    format!("{}:", target)
}

/// Transfer one file, or only announce it when `simulate` is set.
///
/// Simulation never reaches `transferrer` and always succeeds.
pub async fn invoke<T>(
    transferrer: &T,
    path: &Path,
    target: &str,
    simulate: bool,
) -> Result<(), TransferError>
where
    T: Transferrer + ?Sized,
{
    let destination = destination(target);

    if simulate {
        println!("[DRY RUN] Would copy: {} to {}", path.display(), destination);
        return Ok(());
    }

    println!("Copying: {} to {}", path.display(), destination);
    let result = transferrer.transfer(path, target).await;
    debug!(path = %path.display(), ok = result.is_ok(), "Transfer finished");
    result
}
