//! Sync configuration
//!
//! Resolves the well-known file locations: the Steam shortcuts container
//! under `userdata/<account>/config/` and our own registry index under the
//! user data directory.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;
use walkdir::WalkDir;

/// Configuration for a sync run or the background service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The binary shortcuts container.
    pub shortcuts_path: PathBuf,

    /// The JSON registry index.
    pub registry_path: PathBuf,

    /// Launcher config root (legendary/heroic/nile manifests live here).
    pub store_config_root: PathBuf,

    /// Parallel artwork fetches.
    pub artwork_concurrency: usize,

    /// Background sync interval.
    pub interval: Duration,
}

impl SyncConfig {
    /// Discover default locations for the current user.
    pub fn discover() -> Result<Self, ConfigError> {
        let shortcuts_path = find_shortcuts_file()?;
        let registry_path = dirs::data_dir()
            .ok_or(ConfigError::NoHomeDir)?
            .join("shelfsync")
            .join("registry.json");
        let store_config_root = dirs::config_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self {
            shortcuts_path,
            registry_path,
            store_config_root,
            artwork_concurrency: 4,
            interval: Duration::from_secs(300),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.artwork_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        match self.shortcuts_path.parent() {
            Some(parent) if parent.is_dir() => Ok(()),
            _ => Err(ConfigError::ShortcutsDirMissing(
                self.shortcuts_path.clone(),
            )),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine the user's home directory")]
    NoHomeDir,

    #[error("no Steam userdata directory found")]
    NoSteamUserdata,

    #[error("shortcuts directory does not exist: {0}")]
    ShortcutsDirMissing(PathBuf),

    #[error("artwork concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Locate `userdata/<account>/config/shortcuts.vdf` across the usual Steam
/// roots (native, XDG, flatpak). Prefers an account that already has a
/// shortcuts file; otherwise the first account directory found (the codec
/// treats a missing file as an empty container).
fn find_shortcuts_file() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    let roots = [
        home.join(".steam/steam/userdata"),
        home.join(".local/share/Steam/userdata"),
        home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam/userdata"),
    ];

    let mut fallback = None;
    for root in roots.iter().filter(|r| r.is_dir()) {
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
        {
            // Account directories are numeric Steam IDs
            if !entry.file_name().to_string_lossy().chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let candidate = entry.path().join("config").join("shortcuts.vdf");
            if candidate.exists() {
                debug!("using shortcuts file {}", candidate.display());
                return Ok(candidate);
            }
            fallback.get_or_insert(candidate);
        }
    }
    fallback.ok_or(ConfigError::NoSteamUserdata)
}
