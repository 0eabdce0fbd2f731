//! Camera capture adapter: scoped camera streams and still-image encoding.

use std::path::PathBuf;

use image::DynamicImage;
use shared::{domain::CapturedImage, error::WorkflowError};
use thiserror::Error;
use tracing::{debug, info};

mod directory;
mod encode;

pub use directory::DirectoryCamera;
pub use encode::{encode_file, encode_frame, preview_file};

/// JPEG quality used for attendance snapshots.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;
/// JPEG quality used for registration poses.
pub const REGISTRATION_JPEG_QUALITY: u8 = 90;
/// Longest edge of dataset preview thumbnails.
pub const PREVIEW_MAX_DIMENSION: u32 = 240;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0}")]
    Unavailable(String),
    #[error("camera stream is not open")]
    StreamClosed,
    #[error("failed to read frame: {0}")]
    Frame(String),
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{}' is not an image file ({mime})", path.display())]
    NotAnImage { path: PathBuf, mime: String },
}

impl From<CaptureError> for WorkflowError {
    fn from(value: CaptureError) -> Self {
        match value {
            CaptureError::Io { .. } | CaptureError::NotAnImage { .. } => {
                WorkflowError::Validation(value.to_string())
            }
            other => WorkflowError::CameraUnavailable(other.to_string()),
        }
    }
}

/// A camera that can be opened into a live frame source.
pub trait CameraDevice: Send + Sync {
    /// Fails with [`CaptureError::Unavailable`] when permission is denied or no device exists.
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError>;

    fn describe(&self) -> String {
        "camera".to_string()
    }
}

/// A live video source.
pub trait FrameSource: Send {
    fn current_frame(&mut self) -> Result<DynamicImage, CaptureError>;

    /// Releases the underlying hardware. Called exactly once per opened source.
    fn release(&mut self);
}

/// Scoped handle to an open camera. The source is released on [`CameraStream::close`]
/// or when the handle is dropped, whichever comes first.
pub struct CameraStream {
    source: Option<Box<dyn FrameSource>>,
    label: String,
}

pub fn open_stream(device: &dyn CameraDevice) -> Result<CameraStream, CaptureError> {
    let label = device.describe();
    let source = device.open()?;
    info!(camera = %label, "camera stream opened");
    Ok(CameraStream {
        source: Some(source),
        label,
    })
}

impl CameraStream {
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Grabs the current frame and encodes it as a JPEG data URL.
    pub fn capture_frame(&mut self, quality: u8) -> Result<CapturedImage, CaptureError> {
        let source = self.source.as_mut().ok_or(CaptureError::StreamClosed)?;
        let frame = source.current_frame()?;
        debug!(
            camera = %self.label,
            width = frame.width(),
            height = frame.height(),
            "captured frame"
        );
        encode_frame(&frame, quality)
    }

    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
            info!(camera = %self.label, "camera stream released");
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
