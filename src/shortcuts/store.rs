//! On-disk shortcuts store with the validated write protocol
//!
//! Every write goes through the same sequence:
//! 1. copy the current file to `<path>.backup` (if one exists)
//! 2. write the new bytes, flush and fsync
//! 3. re-open and decode the just-written file
//! 4. on a record-count mismatch, restore the backup and fail
//!
//! A write is never reported durable until the re-read check passes.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{codec, ShortcutMap, ShortcutsError};

pub struct ShortcutsStore {
    path: PathBuf,
}

impl ShortcutsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling backup path: `<path>.backup`.
    pub fn backup_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_os_string();
        os.push(".backup");
        PathBuf::from(os)
    }

    /// Load the container. A missing file is an empty container, not an
    /// error, so a first-run sync has a valid starting state.
    pub fn load(&self) -> Result<ShortcutMap, ShortcutsError> {
        if !self.path.exists() {
            debug!("shortcuts file {} does not exist yet", self.path.display());
            return Ok(ShortcutMap::new());
        }
        let bytes = fs::read(&self.path).map_err(|source| ShortcutsError::Io {
            path: self.path.clone(),
            source,
        })?;
        codec::decode(&bytes)
    }

    /// Encode and persist the container through the validated write path.
    pub fn save(&self, map: &ShortcutMap) -> Result<(), ShortcutsError> {
        self.write_validated(&codec::encode(map), map.len())
    }

    /// The raw write protocol. Split out from `save` so the validation
    /// failure path can be exercised with deliberately wrong expectations.
    pub(crate) fn write_validated(
        &self,
        bytes: &[u8],
        expected_records: usize,
    ) -> Result<(), ShortcutsError> {
        let backup = self.backup_path();
        let had_original = self.path.exists();

        if had_original {
            fs::copy(&self.path, &backup).map_err(|source| ShortcutsError::Io {
                path: backup.clone(),
                source,
            })?;
        }

        self.write_and_sync(bytes)?;

        // Re-read and verify before declaring the write durable
        let actual = match fs::read(&self.path)
            .map_err(|source| ShortcutsError::Io {
                path: self.path.clone(),
                source,
            })
            .and_then(|b| codec::decode(&b))
        {
            Ok(reread) => reread.len(),
            Err(e) => {
                warn!("re-read of {} failed: {e}", self.path.display());
                self.restore_backup(had_original)?;
                return Err(ShortcutsError::WriteValidation {
                    expected: expected_records,
                    actual: 0,
                });
            }
        };

        if actual != expected_records {
            warn!(
                "shortcut count mismatch after write: expected {expected_records}, found {actual}"
            );
            self.restore_backup(had_original)?;
            return Err(ShortcutsError::WriteValidation {
                expected: expected_records,
                actual,
            });
        }

        info!(
            "wrote {} shortcuts to {}",
            expected_records,
            self.path.display()
        );
        Ok(())
    }

    fn write_and_sync(&self, bytes: &[u8]) -> Result<(), ShortcutsError> {
        let io_err = |source| ShortcutsError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = File::create(&self.path).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    }

    /// Put the pre-write container back. If there was no original file,
    /// the half-written target is removed instead.
    fn restore_backup(&self, had_original: bool) -> Result<(), ShortcutsError> {
        let backup = self.backup_path();
        if had_original {
            fs::copy(&backup, &self.path).map_err(|source| ShortcutsError::Io {
                path: self.path.clone(),
                source,
            })?;
            warn!("restored {} from backup", self.path.display());
        } else {
            fs::remove_file(&self.path).map_err(|source| ShortcutsError::Io {
                path: self.path.clone(),
                source,
            })?;
            warn!("removed invalid first write of {}", self.path.display());
        }
        Ok(())
    }
}
