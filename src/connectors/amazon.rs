//! Amazon Games connector (nile)
//!
//! nile keeps `~/.config/nile/installed.json` (id + install path) and
//! `library.json` (product metadata). Titles come from the library file
//! when it is available.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::identity::Store;

use super::{read_manifest, ConnectorError, GameDescriptor, StoreConnector};

#[derive(Debug, Deserialize)]
struct NileInstalled {
    id: String,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct NileLibraryEntry {
    #[serde(default)]
    product: NileProduct,
}

#[derive(Debug, Deserialize, Default)]
struct NileProduct {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
}

pub struct AmazonConnector {
    installed: PathBuf,
    library: PathBuf,
}

impl AmazonConnector {
    pub fn new(config_root: &Path) -> Self {
        let nile = config_root.join("nile");
        Self {
            installed: nile.join("installed.json"),
            library: nile.join("library.json"),
        }
    }

    fn titles(&self) -> Result<HashMap<String, String>, ConnectorError> {
        let Some(library) = read_manifest::<Vec<NileLibraryEntry>>(&self.library)? else {
            return Ok(HashMap::new());
        };
        Ok(library
            .into_iter()
            .filter(|e| !e.product.id.is_empty() && !e.product.title.is_empty())
            .map(|e| (e.product.id, e.product.title))
            .collect())
    }
}

impl StoreConnector for AmazonConnector {
    fn store(&self) -> Store {
        Store::Amazon
    }

    fn list_installed_games(&self) -> Result<Vec<GameDescriptor>, ConnectorError> {
        let Some(installed) = read_manifest::<Vec<NileInstalled>>(&self.installed)? else {
            return Ok(Vec::new());
        };
        let titles = self.titles()?;

        let games = installed
            .into_iter()
            .map(|game| {
                let title = titles
                    .get(&game.id)
                    .cloned()
                    .unwrap_or_else(|| game.id.clone());
                let install_path = (!game.path.is_empty()).then(|| PathBuf::from(&game.path));
                GameDescriptor {
                    store: Store::Amazon,
                    store_id: game.id,
                    title,
                    install_path,
                    executable: None,
                }
            })
            .collect::<Vec<_>>();
        debug!("nile reports {} installed games", games.len());
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_nile(root: &Path, installed: &str, library: Option<&str>) {
        let dir = root.join("nile");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("installed.json"), installed).unwrap();
        if let Some(lib) = library {
            fs::write(dir.join("library.json"), lib).unwrap();
        }
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        assert!(AmazonConnector::new(temp.path())
            .list_installed_games()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_titles_joined_from_library() {
        let temp = tempfile::tempdir().unwrap();
        write_nile(
            temp.path(),
            r#"[{"id": "amzn1.g1", "path": "/games/g1"}, {"id": "amzn1.g2", "path": ""}]"#,
            Some(r#"[{"product": {"id": "amzn1.g1", "title": "Lost Tomb"}}]"#),
        );
        let games = AmazonConnector::new(temp.path())
            .list_installed_games()
            .unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].title, "Lost Tomb");
        assert_eq!(games[1].title, "amzn1.g2");
        assert_eq!(games[0].install_path, Some(PathBuf::from("/games/g1")));
    }
}
