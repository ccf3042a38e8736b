//! GOG connector (Heroic)
//!
//! Heroic keeps `~/.config/heroic/gog_store/installed.json` with an
//! `installed` array. Titles are not stored there, so the install
//! directory name stands in when the optional title field is absent.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::identity::Store;

use super::{read_manifest, ConnectorError, GameDescriptor, StoreConnector};

#[derive(Debug, Deserialize)]
struct HeroicInstalled {
    #[serde(default)]
    installed: Vec<HeroicGame>,
}

#[derive(Debug, Deserialize)]
struct HeroicGame {
    #[serde(rename = "appName")]
    app_name: String,
    #[serde(default)]
    install_path: String,
    #[serde(default)]
    title: String,
}

pub struct GogConnector {
    manifest: PathBuf,
}

impl GogConnector {
    pub fn new(config_root: &Path) -> Self {
        Self {
            manifest: config_root
                .join("heroic")
                .join("gog_store")
                .join("installed.json"),
        }
    }
}

impl StoreConnector for GogConnector {
    fn store(&self) -> Store {
        Store::Gog
    }

    fn list_installed_games(&self) -> Result<Vec<GameDescriptor>, ConnectorError> {
        let Some(manifest) = read_manifest::<HeroicInstalled>(&self.manifest)? else {
            return Ok(Vec::new());
        };

        let games = manifest
            .installed
            .into_iter()
            .map(|game| {
                let install_path =
                    (!game.install_path.is_empty()).then(|| PathBuf::from(&game.install_path));
                let title = if !game.title.is_empty() {
                    game.title
                } else {
                    install_path
                        .as_deref()
                        .and_then(Path::file_name)
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| game.app_name.clone())
                };
                GameDescriptor {
                    store: Store::Gog,
                    store_id: game.app_name,
                    title,
                    install_path,
                    executable: None,
                }
            })
            .collect::<Vec<_>>();
        debug!("heroic reports {} installed GOG games", games.len());
        Ok(games)
    }
}
