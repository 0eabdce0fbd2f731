use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONNECTIVITY_FAILURE_MESSAGE: &str = "Unable to reach the recognition server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CameraUnavailable,
    Validation,
    BackendRejected,
    ConnectivityFailure,
    Busy,
    InvalidState,
}

/// Failures surfaced by the workflow controllers.
///
/// Every backend-call error is converted into one of these variants at the
/// controller boundary; none of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BackendRejected(String),
    #[error("{0}")]
    ConnectivityFailure(String),
    #[error("a submission is already in progress")]
    Busy,
    #[error("operation is not available at wizard step {step}")]
    InvalidStep { step: u8 },
    #[error("no file at index {index} (batch holds {len})")]
    InvalidIndex { index: usize, len: usize },
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn connectivity() -> Self {
        Self::ConnectivityFailure(CONNECTIVITY_FAILURE_MESSAGE.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CameraUnavailable(_) => ErrorKind::CameraUnavailable,
            Self::Validation(_) => ErrorKind::Validation,
            Self::BackendRejected(_) => ErrorKind::BackendRejected,
            Self::ConnectivityFailure(_) => ErrorKind::ConnectivityFailure,
            Self::Busy => ErrorKind::Busy,
            Self::InvalidStep { .. } | Self::InvalidIndex { .. } => ErrorKind::InvalidState,
        }
    }

    /// Whether the operator can repeat the same action without changing input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::BackendRejected | ErrorKind::ConnectivityFailure | ErrorKind::Busy
        )
    }
}
