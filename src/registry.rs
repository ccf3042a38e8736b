//! Registry index
//!
//! A JSON cache mapping games to their assigned shortcut slots, so
//! repeated syncs keep updating the same slot instead of inserting
//! duplicates. Lookup by identity wins; a normalized-title match is only a
//! fallback for entries recorded before identity tokens existed. The
//! shortcuts container remains the source of truth: a lost or corrupt
//! index starts empty and is rebuilt by the merge engine from the identity
//! tokens found in the container.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::identity::ExternalIdentity;
use crate::shortcuts::ShortcutMap;

/// Case-folded, whitespace-collapsed title used for fallback matching.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub normalized_title: String,
    pub slot: u32,
    /// Absent for entries written before identity tokens were embedded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ExternalIdentity>,
    pub last_synced: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    entries: Vec<RegistryEntry>,

    /// Highest slot handed out this run. Freed slots are never reused
    /// within a run, so a foreign record added concurrently cannot collide.
    #[serde(skip)]
    high_water: Option<u32>,

    #[serde(skip)]
    path: PathBuf,
}

impl RegistryIndex {
    /// Load the index, starting empty on absence or corruption.
    pub fn load(path: &Path) -> Self {
        let mut index = match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<RegistryIndex>(&text) {
                Ok(index) => index,
                Err(e) => {
                    warn!("registry index {} is corrupt ({e}), starting empty", path.display());
                    RegistryIndex::default()
                }
            },
            Err(_) => {
                debug!("registry index {} not found, starting empty", path.display());
                RegistryIndex::default()
            }
        };
        index.path = path.to_path_buf();
        index
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serializing registry index")?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing registry index {}", self.path.display()))?;
        Ok(())
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, identity: &ExternalIdentity) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.identity.as_ref() == Some(identity))
            .map(|e| e.slot)
    }

    /// Resolve the slot for a logical game.
    ///
    /// Identity match is authoritative. A normalized-title match is only
    /// consulted for identity-less legacy entries, so two stores selling a
    /// game under the same title stay distinct. Otherwise a fresh slot one
    /// past the maximum in use (index, live container, and anything handed
    /// out earlier this run) is assigned.
    pub fn find_or_assign_slot(
        &mut self,
        normalized_title: &str,
        identity: &ExternalIdentity,
        container: &ShortcutMap,
    ) -> u32 {
        if let Some(slot) = self.lookup(identity) {
            return slot;
        }
        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.identity.is_none() && e.normalized_title == normalized_title)
        {
            return entry.slot;
        }

        let next = self.next_free_slot(container);
        debug!("assigned slot {next} for '{normalized_title}' ({identity})");
        next
    }

    /// Hand out a slot one past everything in use: the index, the live
    /// container, and anything assigned earlier this run.
    pub fn next_free_slot(&mut self, container: &ShortcutMap) -> u32 {
        let max_used = self
            .entries
            .iter()
            .map(|e| e.slot)
            .chain(container.keys().copied())
            .max();
        let mut next = max_used.map_or(0, |m| m + 1);
        if let Some(hw) = self.high_water {
            next = next.max(hw + 1);
        }
        self.high_water = Some(next);
        next
    }

    /// Upsert the entry for `identity`. Also claims a matching legacy
    /// (identity-less) title entry rather than duplicating it.
    pub fn record_sync(
        &mut self,
        normalized_title: &str,
        identity: &ExternalIdentity,
        slot: u32,
        timestamp: DateTime<Utc>,
    ) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.identity.as_ref() == Some(identity))
        {
            entry.normalized_title = normalized_title.to_string();
            entry.slot = slot;
            entry.last_synced = timestamp;
            return;
        }
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.identity.is_none() && e.normalized_title == normalized_title)
        {
            entry.identity = Some(identity.clone());
            entry.slot = slot;
            entry.last_synced = timestamp;
            return;
        }
        self.entries.push(RegistryEntry {
            normalized_title: normalized_title.to_string(),
            slot,
            identity: Some(identity.clone()),
            last_synced: timestamp,
        });
    }
}
