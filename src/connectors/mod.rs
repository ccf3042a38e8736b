//! Store connectors
//!
//! Each connector enumerates one storefront's games by reading the
//! installed-game manifests its native Linux launcher keeps on disk:
//! - Epic: legendary's `installed.json`
//! - GOG: Heroic's `gog_store/installed.json`
//! - Amazon: nile's `installed.json` + `library.json`
//!
//! A missing manifest means the launcher is not set up and yields an empty
//! list; an unreadable or unparsable one is a `ConnectorError`, which the
//! pipeline isolates per store so one failing storefront does not abort
//! the whole sync.

pub mod amazon;
pub mod epic;
pub mod gog;

pub use amazon::AmazonConnector;
pub use epic::EpicConnector;
pub use gog::GogConnector;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::identity::{ExternalIdentity, Store};

/// One game as a connector reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDescriptor {
    pub store: Store,
    pub store_id: String,
    pub title: String,
    pub install_path: Option<PathBuf>,
    pub executable: Option<PathBuf>,
}

impl GameDescriptor {
    pub fn identity(&self) -> ExternalIdentity {
        ExternalIdentity::new(self.store, self.store_id.clone())
    }

    /// The string written into the shortcut's `exe` field: the game binary
    /// when the manifest names one, otherwise the store launcher's own
    /// launch command.
    pub fn launch_target(&self) -> String {
        if let Some(exe) = &self.executable {
            return exe.to_string_lossy().into_owned();
        }
        match self.store {
            Store::Epic => format!("legendary launch {}", self.store_id),
            Store::Gog => format!("heroic://launch/gog/{}", self.store_id),
            Store::Amazon => format!("nile launch {}", self.store_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A storefront the sync engine can pull games from.
pub trait StoreConnector: Send + Sync {
    fn store(&self) -> Store;

    fn list_installed_games(&self) -> Result<Vec<GameDescriptor>, ConnectorError>;

    /// Remote catalog, for stores that expose one. Manifest-backed
    /// connectors only see installed games.
    fn list_remote_games(&self) -> Result<Vec<GameDescriptor>, ConnectorError> {
        Ok(Vec::new())
    }
}

/// All connectors rooted at the user's config directory.
pub fn default_connectors(config_root: &Path) -> Vec<Box<dyn StoreConnector>> {
    vec![
        Box::new(EpicConnector::new(config_root)),
        Box::new(GogConnector::new(config_root)),
        Box::new(AmazonConnector::new(config_root)),
    ]
}

/// Read and parse a JSON manifest; `None` when the file does not exist.
fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConnectorError> {
    if !path.exists() {
        debug!("manifest {} not present", path.display());
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| ConnectorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| ConnectorError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_target_prefers_executable() {
        let mut game = GameDescriptor {
            store: Store::Epic,
            store_id: "fn".to_string(),
            title: "Fortnite".to_string(),
            install_path: None,
            executable: Some(PathBuf::from("/games/fn/FortniteClient.exe")),
        };
        assert_eq!(game.launch_target(), "/games/fn/FortniteClient.exe");

        game.executable = None;
        assert_eq!(game.launch_target(), "legendary launch fn");
    }

    #[test]
    fn test_launcher_fallbacks_per_store() {
        for (store, expected) in [
            (Store::Gog, "heroic://launch/gog/x1"),
            (Store::Amazon, "nile launch x1"),
        ] {
            let game = GameDescriptor {
                store,
                store_id: "x1".to_string(),
                title: "X".to_string(),
                install_path: None,
                executable: None,
            };
            assert_eq!(game.launch_target(), expected);
        }
    }
}
