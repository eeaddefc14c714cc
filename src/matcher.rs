//! Case-insensitive file extension matching

use crate::error::ConfigError;
use std::path::Path;

/// Normalized set of extensions, each lower-cased with a leading dot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: Vec<String>,
}

impl ExtensionSet {
    /// Build a set from user-supplied extensions. `mp3`, `.mp3` and `.MP3`
    /// all normalize to `.mp3`.
    pub fn new<I, S>(extensions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();

        for raw in extensions {
            let ext = normalize(raw.as_ref())?;
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }

        if normalized.is_empty() {
            return Err(ConfigError::NoExtensions);
        }

        Ok(Self {
            extensions: normalized,
        })
    }

    /// Whether `path` carries one of the configured extensions.
    ///
    /// Callers are responsible for excluding directories.
    pub fn matches(&self, path: &Path) -> bool {
        match extension_of(path) {
            Some(ext) => self.extensions.iter().any(|configured| *configured == ext),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

fn normalize(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);

    if bare.is_empty() || bare.contains(['/', '\\']) {
        return Err(ConfigError::InvalidExtension {
            extension: raw.to_string(),
        });
    }

    Ok(format!(".{}", bare.to_lowercase()))
}

/// Lower-cased extension of the final path component, dot included.
/// Everything from the last `.` counts, so a file named `.mp3` has
/// extension `.mp3`; a trailing dot means no extension. Names that are not
/// valid UTF-8 are read lossily, which leaves an ASCII suffix intact.
fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let idx = name.rfind('.')?;
    let ext = &name[idx..];

    if ext.len() == 1 {
        return None;
    }

    Some(ext.to_lowercase())
}
