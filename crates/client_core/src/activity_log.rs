//! Process-wide store of successful attendance checks.
//!
//! Entries are kept most-recent-first and the whole sequence is flushed to the
//! key-value store under [`ACTIVITY_LOG_KEY`] after every append. There is no
//! capacity bound and no deduplication.

use std::sync::Arc;

use anyhow::{Context, Result};
use shared::domain::ActivityLogEntry;
use storage::{load_json, save_json, KeyValueStore};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub const ACTIVITY_LOG_KEY: &str = "deepface_logs";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardSummary {
    pub total_attendance: usize,
    /// Mean over entries whose confidence reads as a number.
    pub mean_confidence: Option<f64>,
}

pub struct ActivityLog {
    store: Arc<dyn KeyValueStore>,
    entries: RwLock<Vec<ActivityLogEntry>>,
    /// Held from mutation through flush so stores land in mutation order.
    flush: Mutex<()>,
}

impl ActivityLog {
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let entries: Vec<ActivityLogEntry> = load_json(store.as_ref(), ACTIVITY_LOG_KEY)
            .await
            .context("persisted activity log is corrupt")?
            .unwrap_or_default();
        info!(entries = entries.len(), "activity log loaded");
        Ok(Self {
            store,
            entries: RwLock::new(entries),
            flush: Mutex::new(()),
        })
    }

    /// Inserts `entry` at the front and persists the full log.
    ///
    /// The in-memory log keeps the entry even if persisting fails.
    pub async fn append(&self, entry: ActivityLogEntry) -> Result<()> {
        let _flush = self.flush.lock().await;
        let snapshot = {
            let mut entries = self.entries.write().await;
            entries.insert(0, entry);
            entries.clone()
        };
        save_json(self.store.as_ref(), ACTIVITY_LOG_KEY, &snapshot)
            .await
            .context("failed to persist activity log")?;
        debug!(entries = snapshot.len(), "activity log flushed");
        Ok(())
    }

    pub async fn entries(&self) -> Vec<ActivityLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn recent(&self, limit: usize) -> Vec<ActivityLogEntry> {
        self.entries.read().await.iter().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn summary(&self) -> DashboardSummary {
        let entries = self.entries.read().await;
        let scores: Vec<f64> = entries
            .iter()
            .filter_map(|entry| entry.confidence.as_f64())
            .collect();
        let mean_confidence =
            (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
        DashboardSummary {
            total_attendance: entries.len(),
            mean_confidence,
        }
    }
}

#[cfg(test)]
#[path = "tests/activity_log_tests.rs"]
mod tests;
