//! Recursive discovery of files to transfer

use crate::error::DiscoveryError;
use crate::matcher::ExtensionSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Recursively collect every non-directory entry under `root` whose
/// extension is in `extensions`.
///
/// Entries are visited in file-name order within each directory. The first
/// traversal error aborts the walk and no partial result is returned.
pub fn discover(root: &Path, extensions: &ExtensionSet) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut matching = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            root: root.to_path_buf(),
            source,
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        if extensions.matches(entry.path()) {
            trace!(path = %entry.path().display(), "Matched file");
            matching.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), count = matching.len(), "Discovery finished");
    Ok(matching)
}

/// Run [`discover`] on the blocking thread pool
pub async fn discover_blocking(
    root: PathBuf,
    extensions: ExtensionSet,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    tokio::task::spawn_blocking(move || discover(&root, &extensions))
        .await
        .map_err(|e| DiscoveryError::Interrupted(e.to_string()))?
}
