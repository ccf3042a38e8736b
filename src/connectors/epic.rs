//! Epic Games connector (legendary)
//!
//! legendary keeps `~/.config/legendary/installed.json`, a map of
//! app name -> install record. The executable field is relative to the
//! install path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::identity::Store;

use super::{read_manifest, ConnectorError, GameDescriptor, StoreConnector};

#[derive(Debug, Deserialize)]
struct LegendaryGame {
    #[serde(default)]
    title: String,
    #[serde(default)]
    install_path: String,
    #[serde(default)]
    executable: String,
}

pub struct EpicConnector {
    manifest: PathBuf,
}

impl EpicConnector {
    pub fn new(config_root: &Path) -> Self {
        Self {
            manifest: config_root.join("legendary").join("installed.json"),
        }
    }
}

impl StoreConnector for EpicConnector {
    fn store(&self) -> Store {
        Store::Epic
    }

    fn list_installed_games(&self) -> Result<Vec<GameDescriptor>, ConnectorError> {
        let Some(installed) = read_manifest::<HashMap<String, LegendaryGame>>(&self.manifest)?
        else {
            return Ok(Vec::new());
        };

        let games = installed
            .into_iter()
            .map(|(app_name, game)| {
                let install_path =
                    (!game.install_path.is_empty()).then(|| PathBuf::from(&game.install_path));
                let executable = match (&install_path, game.executable.as_str()) {
                    (Some(dir), exe) if !exe.is_empty() => Some(dir.join(exe)),
                    _ => None,
                };
                let title = if game.title.is_empty() {
                    app_name.clone()
                } else {
                    game.title
                };
                GameDescriptor {
                    store: Store::Epic,
                    store_id: app_name,
                    title,
                    install_path,
                    executable,
                }
            })
            .collect::<Vec<_>>();
        debug!("legendary reports {} installed games", games.len());
        Ok(games)
    }
}
