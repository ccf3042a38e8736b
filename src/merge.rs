//! Registry reconciliation
//!
//! Merges the desired entries gathered from every store connector into the
//! shortcuts container:
//! - records without a recognized identity token are foreign and are never
//!   modified, re-slotted or removed
//! - slot resolution goes through the registry index, so a game keeps its
//!   slot across renames and re-syncs
//! - an owned record whose identity no longer appears in the desired set
//!   is removed, unless its whole store failed to enumerate this run
//! - a sync producing byte-identical output skips the write entirely
//!
//! The registry index is only persisted after the container write has been
//! validated, so a failed write leaves both files consistent for a retry.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::identity::{build_launch_options, extract_identity, ExternalIdentity, Store};
use crate::registry::{normalize_title, RegistryIndex};
use crate::shortcuts::{codec, Shortcut, ShortcutsStore, APP_NAME, EXE, LAUNCH_OPTIONS, START_DIR};

/// One game a connector wants present in the container.
#[derive(Debug, Clone)]
pub struct DesiredEntry {
    pub title: String,
    pub launch_target: String,
    pub start_dir: Option<String>,
    pub identity: ExternalIdentity,
}

/// What a merge pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// False when the container was already up to date and no write
    /// happened.
    pub wrote: bool,
}

/// Run one merge pass against the container and registry index on disk.
///
/// `failed_stores` lists connectors whose enumeration failed this run;
/// their identities carry no information and are exempt from removal.
pub fn run_merge(
    shortcuts_path: &Path,
    registry_path: &Path,
    desired: &[DesiredEntry],
    failed_stores: &HashSet<Store>,
) -> Result<MergeStats> {
    let store = ShortcutsStore::new(shortcuts_path);
    let current = store.load().context("loading shortcuts container")?;
    let mut registry = RegistryIndex::load(registry_path);

    let now = Utc::now();
    let mut stats = MergeStats::default();

    // Partition the container and adopt owned records the index lost
    // (lazy rebuild after index corruption).
    let mut owned: BTreeMap<u32, ExternalIdentity> = BTreeMap::new();
    for (&slot, record) in &current {
        let Some(id) = record.launch_options().and_then(extract_identity) else {
            continue;
        };
        if registry.lookup(&id).is_none() {
            let title = normalize_title(record.app_name().unwrap_or_default());
            debug!("adopting container record at slot {slot} ({id}) into the index");
            registry.record_sync(&title, &id, slot, now);
        }
        owned.insert(slot, id);
    }

    let mut next = current.clone();
    let mut inserted: HashSet<u32> = HashSet::new();

    for entry in desired {
        let normalized = normalize_title(&entry.title);
        let mut slot = registry.find_or_assign_slot(&normalized, &entry.identity, &current);

        if next.contains_key(&slot) && !owned.contains_key(&slot) && !inserted.contains(&slot) {
            // Stale index entry: the slot was freed in an earlier run and
            // a foreign record has since taken it. Foreign records are
            // untouchable, so the game moves to a fresh slot instead.
            let fresh = registry.next_free_slot(&current);
            warn!(
                "slot {slot} for {} is held by a foreign record, reassigning to {fresh}",
                entry.identity
            );
            slot = fresh;
        }

        match next.get_mut(&slot) {
            Some(record) => {
                let options =
                    build_launch_options(&entry.identity, record.launch_options().unwrap_or(""));
                let start_dir_changed = entry
                    .start_dir
                    .as_deref()
                    .is_some_and(|d| record.get_str(START_DIR) != Some(d));
                let changed = record.app_name() != Some(entry.title.as_str())
                    || record.exe() != Some(entry.launch_target.as_str())
                    || record.launch_options() != Some(options.as_str())
                    || start_dir_changed;
                if changed {
                    record.set_str(APP_NAME, &entry.title);
                    record.set_str(EXE, &entry.launch_target);
                    record.set_str(LAUNCH_OPTIONS, &options);
                    if let Some(dir) = &entry.start_dir {
                        record.set_str(START_DIR, dir);
                    }
                    stats.updated += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
            None => {
                let options = build_launch_options(&entry.identity, "");
                next.insert(
                    slot,
                    Shortcut::new(
                        &entry.title,
                        &entry.launch_target,
                        entry.start_dir.as_deref().unwrap_or(""),
                        &options,
                    ),
                );
                inserted.insert(slot);
                stats.added += 1;
            }
        }
        registry.record_sync(&normalized, &entry.identity, slot, now);
    }

    // Owned records whose game is gone from its store
    let desired_ids: HashSet<&ExternalIdentity> = desired.iter().map(|e| &e.identity).collect();
    for (slot, id) in &owned {
        if desired_ids.contains(id) {
            continue;
        }
        if failed_stores.contains(&id.store) {
            debug!("{} failed to enumerate, keeping {id} at slot {slot}", id.store);
            continue;
        }
        info!("removing {id} at slot {slot} (no longer installed)");
        next.remove(slot);
        stats.removed += 1;
    }

    // Idempotence gate: a no-op sync never touches the file or its backup
    if codec::encode(&next) == codec::encode(&current) {
        debug!("container already up to date, skipping write");
        registry.save().context("saving registry index")?;
        return Ok(stats);
    }

    store
        .save(&next)
        .context("writing shortcuts container")?;
    registry.save().context("saving registry index")?;
    stats.wrote = true;

    info!(
        "merge complete: {} added, {} updated, {} removed, {} unchanged",
        stats.added, stats.updated, stats.removed, stats.unchanged
    );
    Ok(stats)
}
