//! Five-step face registration wizard.

use std::sync::Arc;

use capture::{open_stream, CameraDevice, CameraStream, REGISTRATION_JPEG_QUALITY};
use shared::{
    domain::{CapturedImage, Identity},
    error::WorkflowError,
    protocol::{AckResponse, RegisterRequest},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{backend::RecognitionBackend, submission::SubmissionGate};

pub const MAX_POSES: usize = 3;
pub const DEFAULT_REGISTER_ERROR: &str = "Error server";
pub const DEFAULT_REGISTER_SUCCESS: &str = "Face registered.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WizardStep {
    EnterIdentity = 0,
    CaptureFront = 1,
    CaptureLeft = 2,
    CaptureRight = 3,
    Review = 4,
}

impl WizardStep {
    pub fn index(self) -> u8 {
        self as u8
    }

    fn next(self) -> Self {
        match self {
            Self::EnterIdentity => Self::CaptureFront,
            Self::CaptureFront => Self::CaptureLeft,
            Self::CaptureLeft => Self::CaptureRight,
            Self::CaptureRight | Self::Review => Self::Review,
        }
    }

    pub fn is_capture(self) -> bool {
        matches!(
            self,
            Self::CaptureFront | Self::CaptureLeft | Self::CaptureRight
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::EnterIdentity => "Identity",
            Self::CaptureFront => "Front face",
            Self::CaptureLeft => "Left face",
            Self::CaptureRight => "Right face",
            Self::Review => "Review",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Self::EnterIdentity => "Enter NIM and full name",
            Self::CaptureFront => "Look straight at the camera",
            Self::CaptureLeft => "Turn your head slightly to the left",
            Self::CaptureRight => "Turn your head slightly to the right",
            Self::Review => "Review the captures and save",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSnapshot {
    pub step: WizardStep,
    pub identity: Option<Identity>,
    pub captured_poses: usize,
    pub confirmation: Option<String>,
    pub camera_open: bool,
}

struct RegistrationSession {
    identity: Option<Identity>,
    captured_poses: Vec<CapturedImage>,
    step: WizardStep,
    confirmation: Option<String>,
    stream: Option<CameraStream>,
    /// Bumped on every reset so an in-flight submission cannot confirm a newer session.
    generation: u64,
}

impl RegistrationSession {
    fn new(generation: u64) -> Self {
        Self {
            identity: None,
            captured_poses: Vec::with_capacity(MAX_POSES),
            step: WizardStep::EnterIdentity,
            confirmation: None,
            stream: None,
            generation,
        }
    }
}

pub struct RegistrationController {
    backend: Arc<dyn RecognitionBackend>,
    camera: Arc<dyn CameraDevice>,
    session: Mutex<RegistrationSession>,
    gate: SubmissionGate,
}

impl RegistrationController {
    pub fn new(backend: Arc<dyn RecognitionBackend>, camera: Arc<dyn CameraDevice>) -> Self {
        Self {
            backend,
            camera,
            session: Mutex::new(RegistrationSession::new(0)),
            gate: SubmissionGate::default(),
        }
    }

    pub async fn snapshot(&self) -> RegistrationSnapshot {
        let session = self.session.lock().await;
        RegistrationSnapshot {
            step: session.step,
            identity: session.identity.clone(),
            captured_poses: session.captured_poses.len(),
            confirmation: session.confirmation.clone(),
            camera_open: session.stream.as_ref().is_some_and(CameraStream::is_open),
        }
    }

    pub async fn step(&self) -> WizardStep {
        self.session.lock().await.step
    }

    pub async fn captured_poses(&self) -> Vec<CapturedImage> {
        self.session.lock().await.captured_poses.clone()
    }

    pub async fn is_confirmed(&self) -> bool {
        self.session.lock().await.confirmation.is_some()
    }

    /// Validates the identity, opens the camera, and moves to the first pose.
    pub async fn advance_from_identity(&self, nim: &str, name: &str) -> Result<(), WorkflowError> {
        let mut session = self.session.lock().await;
        if session.step != WizardStep::EnterIdentity {
            return Err(WorkflowError::InvalidStep {
                step: session.step.index(),
            });
        }

        let identity = Identity::parse(nim, name)?;
        let stream = open_stream(self.camera.as_ref()).map_err(|err| {
            warn!("registration camera unavailable: {err}");
            WorkflowError::from(err)
        })?;

        info!(nim = %identity.nim, "registration started");
        session.identity = Some(identity);
        session.stream = Some(stream);
        session.step = WizardStep::CaptureFront;
        Ok(())
    }

    /// Captures the pose for the current step and advances one step.
    ///
    /// Outside the capture steps this is a no-op returning `Ok(None)`. The
    /// camera stays open after the last pose until the session ends.
    pub async fn capture_pose(&self) -> Result<Option<WizardStep>, WorkflowError> {
        let mut session = self.session.lock().await;
        if !session.step.is_capture() || session.captured_poses.len() >= MAX_POSES {
            return Ok(None);
        }

        let stream = session.stream.as_mut().ok_or_else(|| {
            WorkflowError::CameraUnavailable("camera stream is not open".to_string())
        })?;
        let image = stream.capture_frame(REGISTRATION_JPEG_QUALITY)?;

        let captured = session.step;
        session.captured_poses.push(image);
        session.step = captured.next();
        info!(pose = captured.label(), "registration pose captured");
        Ok(Some(session.step))
    }

    /// Sends the identity and every captured pose as one request.
    ///
    /// The pose count is not checked here; the server validates it. On any
    /// failure the wizard stays at review with its poses intact.
    pub async fn submit_registration(&self) -> Result<String, WorkflowError> {
        let _permit = self.gate.try_enter()?;

        let (request, generation) = {
            let session = self.session.lock().await;
            if session.step != WizardStep::Review {
                return Err(WorkflowError::InvalidStep {
                    step: session.step.index(),
                });
            }
            let identity = session.identity.clone().ok_or_else(|| {
                WorkflowError::validation("identity is missing; restart the registration")
            })?;
            (
                RegisterRequest {
                    nim: identity.nim,
                    name: identity.name,
                    images: session.captured_poses.clone(),
                },
                session.generation,
            )
        };

        let nim = request.nim.clone();
        let response = self.backend.register(&request).await.map_err(|err| {
            warn!(%nim, "registration request failed: {err}");
            WorkflowError::from(err)
        })?;

        match response {
            AckResponse::Accepted { message } => {
                let message = message.unwrap_or_else(|| DEFAULT_REGISTER_SUCCESS.to_string());
                let mut session = self.session.lock().await;
                if session.generation == generation {
                    session.confirmation = Some(message.clone());
                }
                info!(%nim, "registration accepted");
                Ok(message)
            }
            AckResponse::Rejected { message } => {
                let message = message.unwrap_or_else(|| DEFAULT_REGISTER_ERROR.to_string());
                warn!(%nim, %message, "registration rejected");
                Err(WorkflowError::BackendRejected(message))
            }
        }
    }

    /// Returns the wizard to its initial state and releases the camera.
    pub async fn reset(&self) {
        let mut session = self.session.lock().await;
        let generation = session.generation.wrapping_add(1);
        // Dropping the old session releases its stream.
        *session = RegistrationSession::new(generation);
    }
}

#[cfg(test)]
#[path = "tests/registration_tests.rs"]
mod tests;
