use crate::error::ConfigError;
use crate::matcher::ExtensionSet;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of concurrent transfers when nothing else is configured
pub const DEFAULT_WORKERS: usize = 5;

/// Settings the dispatcher needs for one batch. Never mutated once the
/// batch has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Number of concurrent workers
    pub workers: NonZeroUsize,

    /// Peer that receives every file
    pub target: String,

    /// Report intended transfers without performing them
    pub simulate: bool,
}

impl DispatchConfig {
    pub fn new(workers: usize, target: impl Into<String>, simulate: bool) -> Result<Self, ConfigError> {
        let workers = NonZeroUsize::new(workers).ok_or(ConfigError::ZeroWorkers)?;
        let target = target.into();
        if target.trim().is_empty() {
            return Err(ConfigError::MissingTarget);
        }

        Ok(Self {
            workers,
            target,
            simulate,
        })
    }
}

/// How the `tailscale` binary is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailscaleConfig {
    /// Binary name or path
    pub binary: PathBuf,

    /// Prefix every invocation with `sudo`
    pub use_sudo: bool,
}

impl Default for TailscaleConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(default_tailscale_bin()),
            use_sudo: false,
        }
    }
}

/// Everything a run needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory searched for files
    pub root: PathBuf,

    /// Extensions selecting which files are sent
    pub extensions: ExtensionSet,

    /// Worker pool settings
    pub dispatch: DispatchConfig,

    /// Peer network client settings
    pub tailscale: TailscaleConfig,
}

/// Optional per-user config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Extensions used when none are given on the command line
    pub extensions: Vec<String>,

    /// Target used when none is given on the command line
    pub target: Option<String>,

    /// Worker count used when `--workers` is absent
    pub workers: Option<usize>,

    /// Binary name or path of the tailscale CLI
    pub tailscale_bin: String,

    /// Run tailscale through sudo
    pub use_sudo: bool,
}

fn default_tailscale_bin() -> String {
    "tailscale".to_string()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            target: None,
            workers: None,
            tailscale_bin: default_tailscale_bin(),
            use_sudo: false,
        }
    }
}

impl FileConfig {
    /// `<home>/.ts-copy/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ts-copy").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let config = Self::parse(&content, path)?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load an explicitly named file, or the default file when it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tailscale(&self) -> TailscaleConfig {
        TailscaleConfig {
            binary: PathBuf::from(&self.tailscale_bin),
            use_sudo: self.use_sudo,
        }
    }
}
