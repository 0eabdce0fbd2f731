use std::sync::Arc;

use anyhow::Result;
use capture::CameraDevice;
use storage::KeyValueStore;

pub mod activity_log;
pub mod attendance;
pub mod backend;
pub mod connectivity;
pub mod dashboard;
pub mod dataset;
pub mod registration;
mod submission;

pub use activity_log::{ActivityLog, DashboardSummary, ACTIVITY_LOG_KEY};
pub use attendance::{AttendanceController, AttendanceState};
pub use backend::{
    BackendError, HttpBackend, RecognitionBackend, DEFAULT_BACKEND_URL, DEFAULT_REQUEST_TIMEOUT,
};
pub use connectivity::ConnectivityIndicator;
pub use dashboard::{load_dashboard, DashboardView};
pub use dataset::{BatchSlot, DatasetUploader};
pub use registration::{RegistrationController, RegistrationSnapshot, WizardStep};

/// Process-wide state shared by every workflow: the backend, the activity
/// log, and the connectivity indicator.
#[derive(Clone)]
pub struct KioskContext {
    backend: Arc<dyn RecognitionBackend>,
    log: Arc<ActivityLog>,
    connectivity: ConnectivityIndicator,
    jpeg_quality: u8,
}

impl KioskContext {
    /// Reloads the persisted activity log and wires the shared state together.
    pub async fn initialize(
        backend: Arc<dyn RecognitionBackend>,
        store: Arc<dyn KeyValueStore>,
        jpeg_quality: u8,
    ) -> Result<Self> {
        let log = ActivityLog::load(store).await?;
        Ok(Self {
            backend,
            log: Arc::new(log),
            connectivity: ConnectivityIndicator::new(),
            jpeg_quality,
        })
    }

    pub fn backend(&self) -> &Arc<dyn RecognitionBackend> {
        &self.backend
    }

    pub fn log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    pub fn connectivity(&self) -> &ConnectivityIndicator {
        &self.connectivity
    }

    pub fn attendance(&self) -> AttendanceController {
        AttendanceController::new(
            self.backend.clone(),
            self.log.clone(),
            self.connectivity.clone(),
            self.jpeg_quality,
        )
    }

    pub fn registration(&self, camera: Arc<dyn CameraDevice>) -> RegistrationController {
        RegistrationController::new(self.backend.clone(), camera)
    }

    pub fn dataset(&self) -> DatasetUploader {
        DatasetUploader::new(self.backend.clone())
    }

    pub async fn dashboard(&self, recent_limit: usize) -> DashboardView {
        load_dashboard(
            self.backend.as_ref(),
            &self.log,
            &self.connectivity,
            recent_limit,
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
