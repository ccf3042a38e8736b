//! Sync pipeline
//!
//! Drives one full synchronization through its phases, reporting each
//! transition to the shared tracker:
//! fetching -> checking_installed -> syncing -> metadata_lookup ->
//! checking_artwork -> artwork -> compat_layer_setup -> complete.
//!
//! Connector failures are isolated per store; artwork fetches run as a
//! bounded concurrent pool. Cancellation is cooperative: it is observed at
//! phase boundaries, never mid-merge, so the container is never left
//! partially written.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::connectors::{default_connectors, GameDescriptor, StoreConnector};
use crate::identity::Store;
use crate::merge::{self, DesiredEntry, MergeStats};
use crate::progress::{SyncPhase, SyncTracker};

/// Cooperative stop marker, distinguished from real failures by the
/// service loop and the tracker.
#[derive(Debug, thiserror::Error)]
#[error("sync cancelled")]
pub struct Cancelled;

/// Boundary for artwork downloaders. Implementations fetch grid/hero
/// images for one game; the pipeline handles pooling and progress.
pub trait ArtworkFetcher: Send + Sync {
    fn fetch(&self, game: &GameDescriptor) -> Result<()>;
}

/// Default fetcher: artwork sources are configured externally.
pub struct NoopArtwork;

impl ArtworkFetcher for NoopArtwork {
    fn fetch(&self, _game: &GameDescriptor) -> Result<()> {
        Ok(())
    }
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct SyncReport {
    pub merge: MergeStats,
    pub total_games: usize,
    pub failed_stores: HashSet<Store>,
}

pub struct SyncPipeline {
    config: SyncConfig,
    tracker: SyncTracker,
    connectors: Vec<Box<dyn StoreConnector>>,
    artwork: Arc<dyn ArtworkFetcher>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig, tracker: SyncTracker) -> Self {
        let connectors = default_connectors(&config.store_config_root);
        Self {
            config,
            tracker,
            connectors,
            artwork: Arc::new(NoopArtwork),
        }
    }

    pub fn with_connectors(mut self, connectors: Vec<Box<dyn StoreConnector>>) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn with_artwork(mut self, artwork: Arc<dyn ArtworkFetcher>) -> Self {
        self.artwork = artwork;
        self
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    /// Run one sync, resetting the tracker first and leaving it in a
    /// terminal phase (complete, error or cancelled) afterwards.
    pub async fn run(&self, cancel: &watch::Receiver<bool>) -> Result<SyncReport> {
        self.tracker.reset();
        let started = Instant::now();
        let result = self.run_phases(cancel).await;
        match &result {
            Ok(report) => {
                self.tracker.complete();
                info!(
                    "sync complete in {:?}: {} games, {} added, {} updated, {} removed",
                    started.elapsed(),
                    report.total_games,
                    report.merge.added,
                    report.merge.updated,
                    report.merge.removed
                );
            }
            Err(e) if e.is::<Cancelled>() => self.tracker.cancel(),
            Err(e) => self.tracker.fail(format!("{e:#}")),
        }
        result
    }

    async fn run_phases(&self, cancel: &watch::Receiver<bool>) -> Result<SyncReport> {
        // Phase: fetching
        self.tracker.set_phase(SyncPhase::Fetching);
        let mut games: Vec<GameDescriptor> = Vec::new();
        let mut failed_stores = HashSet::new();
        for connector in &self.connectors {
            check_cancelled(cancel)?;
            match connector.list_installed_games() {
                Ok(list) => {
                    debug!("{}: {} installed games", connector.store(), list.len());
                    games.extend(list);
                }
                Err(e) => {
                    warn!("{} enumeration failed: {e}", connector.store());
                    failed_stores.insert(connector.store());
                }
            }
        }

        // Phase: checking_installed
        self.tracker.set_phase(SyncPhase::CheckingInstalled);
        check_cancelled(cancel)?;
        let mut seen = HashSet::new();
        games.retain(|g| seen.insert(g.identity()));
        self.tracker.set_total_games(games.len());

        // Phase: syncing
        self.tracker.set_phase(SyncPhase::Syncing);
        check_cancelled(cancel)?;
        let desired: Vec<DesiredEntry> = games
            .iter()
            .map(|g| DesiredEntry {
                title: g.title.clone(),
                launch_target: g.launch_target(),
                start_dir: g
                    .install_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                identity: g.identity(),
            })
            .collect();
        let merge_stats = {
            let shortcuts = self.config.shortcuts_path.clone();
            let registry = self.config.registry_path.clone();
            let failed = failed_stores.clone();
            tokio::task::spawn_blocking(move || {
                merge::run_merge(&shortcuts, &registry, &desired, &failed)
            })
            .await
            .context("merge task panicked")??
        };
        self.tracker.set_synced_games(games.len());

        // Phase: metadata_lookup (timestamps recorded during the merge)
        self.tracker.set_phase(SyncPhase::MetadataLookup);
        check_cancelled(cancel)?;

        // Phase: checking_artwork
        self.tracker.set_phase(SyncPhase::CheckingArtwork);
        self.tracker.begin_artwork(games.len());

        // Phase: artwork, bounded pool, completion order unspecified
        self.tracker.set_phase(SyncPhase::Artwork);
        check_cancelled(cancel)?;
        stream::iter(games.clone())
            .map(|game| {
                let fetcher = Arc::clone(&self.artwork);
                let tracker = self.tracker.clone();
                async move {
                    let label = game.title.clone();
                    tracker.set_current_game(&label, current_game_values(&game));
                    let result =
                        tokio::task::spawn_blocking(move || fetcher.fetch(&game)).await;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("artwork fetch for '{label}' failed: {e:#}"),
                        Err(e) => warn!("artwork task for '{label}' panicked: {e}"),
                    }
                    tracker.artwork_done(&label);
                }
            })
            .buffer_unordered(self.config.artwork_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        // Phase: compat_layer_setup (prefix setup is an external concern,
        // the phase exists so pollers see the full range)
        self.tracker.set_phase(SyncPhase::CompatLayerSetup);
        check_cancelled(cancel)?;

        Ok(SyncReport {
            merge: merge_stats,
            total_games: games.len(),
            failed_stores,
        })
    }
}

fn check_cancelled(cancel: &watch::Receiver<bool>) -> Result<()> {
    if *cancel.borrow() {
        return Err(Cancelled.into());
    }
    Ok(())
}

fn current_game_values(game: &GameDescriptor) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    values.insert("store".to_string(), game.store.to_string());
    values.insert("store_id".to_string(), game.store_id.clone());
    values
}
