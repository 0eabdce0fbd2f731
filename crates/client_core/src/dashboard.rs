use shared::{domain::ActivityLogEntry, protocol::StatsResponse};
use tracing::warn;

use crate::{
    activity_log::{ActivityLog, DashboardSummary},
    backend::RecognitionBackend,
    connectivity::ConnectivityIndicator,
};

#[derive(Debug, Clone)]
pub struct DashboardView {
    /// `None` when the backend could not report its registered-user count.
    pub total_registered: Option<u64>,
    pub summary: DashboardSummary,
    pub recent: Vec<ActivityLogEntry>,
    pub backend_connected: bool,
}

impl DashboardView {
    pub fn registered_or_zero(&self) -> u64 {
        self.total_registered.unwrap_or(0)
    }
}

/// Gathers dashboard aggregates; a failing `/stats` call degrades to an offline count.
pub async fn load_dashboard(
    backend: &dyn RecognitionBackend,
    log: &ActivityLog,
    connectivity: &ConnectivityIndicator,
    recent_limit: usize,
) -> DashboardView {
    let total_registered = match backend.stats().await {
        Ok(StatsResponse::Available { total_users }) => Some(total_users),
        Ok(StatsResponse::Unavailable { message }) => {
            warn!(
                message = message.as_deref().unwrap_or_default(),
                "backend declined to report stats"
            );
            None
        }
        Err(err) => {
            warn!("backend stats unavailable, showing offline data: {err}");
            None
        }
    };

    DashboardView {
        total_registered,
        summary: log.summary().await,
        recent: log.recent(recent_limit).await,
        backend_connected: connectivity.is_connected(),
    }
}
