//! Sync progress tracking
//!
//! Phase-weighted percentage reporting for the sync pipeline. Each phase
//! owns a fixed sub-range of [0,100]; only the artwork phase interpolates
//! within its range, everything else reports its start percentage. The
//! tracker is shared across concurrent artwork tasks: increments and the
//! current-game label update happen under one lock, and snapshots are
//! never torn.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

/// Pipeline phases, in pipeline order. The tracker does not enforce
/// ordering; the driver sets phases explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Fetching,
    CheckingInstalled,
    Syncing,
    MetadataLookup,
    CheckingArtwork,
    Artwork,
    CompatLayerSetup,
    Complete,
    Error,
    Cancelled,
}

impl SyncPhase {
    /// The percentage sub-range this phase owns.
    pub fn span(self) -> (u8, u8) {
        match self {
            SyncPhase::Idle => (0, 0),
            SyncPhase::Fetching => (0, 10),
            SyncPhase::CheckingInstalled => (10, 20),
            SyncPhase::Syncing => (20, 40),
            SyncPhase::MetadataLookup => (40, 55),
            SyncPhase::CheckingArtwork => (55, 60),
            SyncPhase::Artwork => (60, 95),
            SyncPhase::CompatLayerSetup => (95, 98),
            SyncPhase::Complete | SyncPhase::Error | SyncPhase::Cancelled => (100, 100),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Fetching => "fetching",
            SyncPhase::CheckingInstalled => "checking_installed",
            SyncPhase::Syncing => "syncing",
            SyncPhase::MetadataLookup => "metadata_lookup",
            SyncPhase::CheckingArtwork => "checking_artwork",
            SyncPhase::Artwork => "artwork",
            SyncPhase::CompatLayerSetup => "compat_layer_setup",
            SyncPhase::Complete => "complete",
            SyncPhase::Error => "error",
            SyncPhase::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncPhase::Complete | SyncPhase::Error | SyncPhase::Cancelled
        )
    }
}

/// Coarse status derived from the phase, for callers that do not care
/// which phase is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Running,
    Complete,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CurrentGame {
    pub label: String,
    pub values: BTreeMap<String, String>,
}

/// Read-only view for pollers (UI, status command).
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub success: bool,
    pub total_games: usize,
    pub synced_games: usize,
    pub current_game: CurrentGame,
    pub status: SyncStatus,
    pub progress_percent: u8,
    pub error: Option<String>,
    pub artwork_total: usize,
    pub artwork_synced: usize,
    pub current_phase: SyncPhase,
}

#[derive(Debug, Default)]
struct ProgressState {
    phase: SyncPhase,
    total_games: usize,
    synced_games: usize,
    current_game: CurrentGame,
    artwork_total: usize,
    artwork_synced: usize,
    error: Option<String>,
}

impl ProgressState {
    fn percent(&self) -> u8 {
        let (start, end) = self.phase.span();
        if self.phase != SyncPhase::Artwork || self.artwork_total == 0 {
            return start;
        }
        // A stray increment past the announced total must not push the
        // report outside the phase's range
        let done = self.artwork_synced.min(self.artwork_total);
        let range = (end - start) as usize;
        start + (range * done / self.artwork_total) as u8
    }
}

/// Shared, cloneable handle to one sync's progress state.
#[derive(Debug, Clone, Default)]
pub struct SyncTracker {
    inner: Arc<Mutex<ProgressState>>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ProgressState> {
        // A panicked holder cannot leave the counters half-updated; take
        // the state as-is rather than poisoning every later caller.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear everything back to idle. Called at each sync start.
    pub fn reset(&self) {
        *self.state() = ProgressState::default();
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.state().phase = phase;
    }

    pub fn set_total_games(&self, total: usize) {
        self.state().total_games = total;
    }

    pub fn set_synced_games(&self, synced: usize) {
        self.state().synced_games = synced;
    }

    pub fn set_current_game(&self, label: &str, values: BTreeMap<String, String>) {
        let mut s = self.state();
        s.current_game = CurrentGame {
            label: label.to_string(),
            values,
        };
    }

    pub fn begin_artwork(&self, total: usize) {
        let mut s = self.state();
        s.artwork_total = total;
        s.artwork_synced = 0;
    }

    /// One artwork item finished. The increment and the label update are a
    /// single atomic unit.
    pub fn artwork_done(&self, label: &str) {
        let mut s = self.state();
        s.artwork_synced += 1;
        s.current_game.label = label.to_string();
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut s = self.state();
        s.phase = SyncPhase::Error;
        s.error = Some(message.into());
    }

    pub fn cancel(&self) {
        self.state().phase = SyncPhase::Cancelled;
    }

    pub fn complete(&self) {
        let mut s = self.state();
        s.phase = SyncPhase::Complete;
        s.synced_games = s.total_games;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let s = self.state();
        let status = match s.phase {
            SyncPhase::Idle => SyncStatus::Idle,
            SyncPhase::Complete => SyncStatus::Complete,
            SyncPhase::Error => SyncStatus::Error,
            SyncPhase::Cancelled => SyncStatus::Cancelled,
            _ => SyncStatus::Running,
        };
        ProgressSnapshot {
            success: s.phase == SyncPhase::Complete,
            total_games: s.total_games,
            synced_games: s.synced_games,
            current_game: s.current_game.clone(),
            status,
            progress_percent: s.percent(),
            error: s.error.clone(),
            artwork_total: s.artwork_total,
            artwork_synced: s.artwork_synced,
            current_phase: s.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_start_reporting() {
        let tracker = SyncTracker::new();
        assert_eq!(tracker.snapshot().progress_percent, 0);

        tracker.set_phase(SyncPhase::CheckingInstalled);
        assert_eq!(tracker.snapshot().progress_percent, 10);

        tracker.set_phase(SyncPhase::Syncing);
        assert_eq!(tracker.snapshot().progress_percent, 20);

        tracker.set_phase(SyncPhase::CompatLayerSetup);
        assert_eq!(tracker.snapshot().progress_percent, 95);
    }

    #[test]
    fn test_terminal_phases_report_100() {
        for phase in [SyncPhase::Complete, SyncPhase::Error, SyncPhase::Cancelled] {
            let tracker = SyncTracker::new();
            tracker.set_phase(phase);
            assert_eq!(tracker.snapshot().progress_percent, 100);
        }
    }

    #[test]
    fn test_artwork_interpolation() {
        let tracker = SyncTracker::new();
        tracker.set_phase(SyncPhase::Artwork);
        tracker.begin_artwork(10);

        let mut last = 0;
        for i in 1..=10 {
            tracker.artwork_done(&format!("game {i}"));
            let pct = tracker.snapshot().progress_percent;
            assert!(pct >= last, "percent went backwards: {last} -> {pct}");
            assert!((60..=95).contains(&pct));
            last = pct;
            if i == 5 {
                // 60 + (95-60) * 5/10, floored
                assert_eq!(pct, 77);
            }
        }
        assert_eq!(last, 95);
    }

    #[test]
    fn test_artwork_overshoot_stays_within_phase_range() {
        let tracker = SyncTracker::new();
        tracker.set_phase(SyncPhase::Artwork);
        tracker.begin_artwork(3);
        // More completions than announced items
        for i in 0..5 {
            tracker.artwork_done(&format!("game {i}"));
        }
        let snap = tracker.snapshot();
        assert_eq!(snap.artwork_synced, 5);
        assert_eq!(snap.progress_percent, 95);
    }

    #[test]
    fn test_artwork_zero_total_reports_phase_start() {
        let tracker = SyncTracker::new();
        tracker.set_phase(SyncPhase::Artwork);
        tracker.begin_artwork(0);
        assert_eq!(tracker.snapshot().progress_percent, 60);
    }

    #[test]
    fn test_concurrent_increments_lose_nothing() {
        let tracker = SyncTracker::new();
        tracker.set_phase(SyncPhase::Artwork);
        let n = 64;
        tracker.begin_artwork(n);

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let t = tracker.clone();
                std::thread::spawn(move || t.artwork_done(&format!("game {i}")))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = tracker.snapshot();
        assert_eq!(snap.artwork_synced, n);
        assert_eq!(snap.progress_percent, 95);
        assert!(snap.current_game.label.starts_with("game "));
    }

    #[test]
    fn test_error_snapshot() {
        let tracker = SyncTracker::new();
        tracker.set_phase(SyncPhase::Syncing);
        tracker.fail("write validation failed");
        let snap = tracker.snapshot();
        assert!(!snap.success);
        assert_eq!(snap.status, SyncStatus::Error);
        assert_eq!(snap.error.as_deref(), Some("write validation failed"));
        assert_eq!(snap.progress_percent, 100);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let tracker = SyncTracker::new();
        tracker.set_phase(SyncPhase::Complete);
        tracker.set_total_games(5);
        tracker.reset();
        let snap = tracker.snapshot();
        assert_eq!(snap.status, SyncStatus::Idle);
        assert_eq!(snap.total_games, 0);
        assert_eq!(snap.progress_percent, 0);
    }

    #[test]
    fn test_snapshot_serializes_with_contract_fields() {
        let tracker = SyncTracker::new();
        tracker.set_phase(SyncPhase::Fetching);
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        for key in [
            "success",
            "total_games",
            "synced_games",
            "current_game",
            "status",
            "progress_percent",
            "error",
            "artwork_total",
            "artwork_synced",
            "current_phase",
        ] {
            assert!(json.get(key).is_some(), "missing snapshot field {key}");
        }
        assert_eq!(json["current_phase"], "fetching");
        assert_eq!(json["status"], "running");
    }
}
