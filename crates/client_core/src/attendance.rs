//! Single "scan and verify" attendance interaction.

use std::sync::Arc;

use capture::{open_stream, CameraDevice, CameraStream};
use chrono::Utc;
use shared::{
    domain::{AttendanceResult, CapturedImage, RecognitionModel},
    error::{ErrorKind, WorkflowError, CONNECTIVITY_FAILURE_MESSAGE},
    protocol::{VerifyRequest, VerifyResponse},
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    activity_log::ActivityLog, backend::RecognitionBackend, connectivity::ConnectivityIndicator,
    submission::SubmissionGate,
};

pub const DEFAULT_REJECTION_MESSAGE: &str = "Wajah tidak dikenali.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceState {
    Idle,
    Capturing,
    Submitting,
    Succeeded,
    Failed,
}

struct AttendanceSession {
    state: AttendanceState,
    stream: Option<CameraStream>,
    last_result: Option<AttendanceResult>,
}

pub struct AttendanceController {
    backend: Arc<dyn RecognitionBackend>,
    log: Arc<ActivityLog>,
    connectivity: ConnectivityIndicator,
    jpeg_quality: u8,
    session: Mutex<AttendanceSession>,
    gate: SubmissionGate,
}

impl AttendanceController {
    pub fn new(
        backend: Arc<dyn RecognitionBackend>,
        log: Arc<ActivityLog>,
        connectivity: ConnectivityIndicator,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            backend,
            log,
            connectivity,
            jpeg_quality,
            session: Mutex::new(AttendanceSession {
                state: AttendanceState::Idle,
                stream: None,
                last_result: None,
            }),
            gate: SubmissionGate::default(),
        }
    }

    /// Opens the camera for this workflow. Re-entering replaces the previous stream.
    pub async fn enter(&self, device: &dyn CameraDevice) -> Result<(), WorkflowError> {
        let stream = open_stream(device).map_err(|err| {
            warn!("attendance camera unavailable: {err}");
            WorkflowError::from(err)
        })?;
        let mut session = self.session.lock().await;
        session.stream = Some(stream);
        session.state = AttendanceState::Idle;
        Ok(())
    }

    /// Releases the camera. Safe to call repeatedly.
    pub async fn exit(&self) {
        let mut session = self.session.lock().await;
        if let Some(mut stream) = session.stream.take() {
            stream.close();
        }
        session.state = AttendanceState::Idle;
    }

    pub async fn state(&self) -> AttendanceState {
        self.session.lock().await.state
    }

    pub async fn last_result(&self) -> Option<AttendanceResult> {
        self.session.lock().await.last_result.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.gate.is_busy()
    }

    /// Captures one frame, verifies it, and records the outcome.
    ///
    /// Backend rejections and connectivity problems come back as
    /// [`AttendanceResult::Failure`]; only a busy controller or a camera fault
    /// is an `Err`.
    pub async fn submit_verification(
        &self,
        model: RecognitionModel,
    ) -> Result<AttendanceResult, WorkflowError> {
        let _permit = self.gate.try_enter()?;

        let image = self.capture().await?;
        self.session.lock().await.state = AttendanceState::Submitting;

        let result = match self.backend.verify(&VerifyRequest { image, model }).await {
            Ok(VerifyResponse::Recognized(identity)) => {
                self.connectivity.set_connected(true);
                let result = AttendanceResult::Success {
                    identity,
                    model,
                    observed_at: Utc::now(),
                };
                if let Some(entry) = result.log_entry() {
                    info!(nim = %entry.nim, name = %entry.name, model = %model, "attendance recorded");
                    if let Err(err) = self.log.append(entry).await {
                        error!("attendance verified but activity log was not persisted: {err:#}");
                    }
                }
                result
            }
            Ok(VerifyResponse::Rejected { message }) => {
                self.connectivity.set_connected(true);
                let reason = message.unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string());
                info!(%reason, "verification rejected");
                AttendanceResult::Failure {
                    kind: ErrorKind::BackendRejected,
                    reason,
                }
            }
            Err(err) => {
                warn!("verification request failed: {err}");
                self.connectivity.set_connected(false);
                AttendanceResult::Failure {
                    kind: ErrorKind::ConnectivityFailure,
                    reason: CONNECTIVITY_FAILURE_MESSAGE.to_string(),
                }
            }
        };

        let mut session = self.session.lock().await;
        session.state = if result.is_success() {
            AttendanceState::Succeeded
        } else {
            AttendanceState::Failed
        };
        session.last_result = Some(result.clone());
        Ok(result)
    }

    async fn capture(&self) -> Result<CapturedImage, WorkflowError> {
        let mut session = self.session.lock().await;
        session.state = AttendanceState::Capturing;
        session.last_result = None;
        let captured = match session.stream.as_mut() {
            Some(stream) => stream
                .capture_frame(self.jpeg_quality)
                .map_err(WorkflowError::from),
            None => Err(WorkflowError::CameraUnavailable(
                "camera stream is not open".to_string(),
            )),
        };
        if captured.is_err() {
            session.state = AttendanceState::Idle;
        }
        captured
    }
}

#[cfg(test)]
#[path = "tests/attendance_tests.rs"]
mod tests;
