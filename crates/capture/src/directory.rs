use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, warn};

use crate::{CameraDevice, CaptureError, FrameSource};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Camera backed by a directory of still frames, replayed in file-name order.
#[derive(Debug, Clone)]
pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn collect_frames(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|err| {
            CaptureError::Unavailable(format!(
                "no camera device at '{}': {err}",
                self.dir.display()
            ))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        frames.sort();
        Ok(frames)
    }
}

impl CameraDevice for DirectoryCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        let frames = self.collect_frames()?;
        if frames.is_empty() {
            return Err(CaptureError::Unavailable(format!(
                "camera '{}' has no frames",
                self.dir.display()
            )));
        }
        debug!(dir = %self.dir.display(), frames = frames.len(), "opened directory camera");
        Ok(Box::new(DirectoryFrames {
            frames,
            cursor: 0,
            released: false,
        }))
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.dir.display())
    }
}

struct DirectoryFrames {
    frames: Vec<PathBuf>,
    cursor: usize,
    released: bool,
}

impl FrameSource for DirectoryFrames {
    fn current_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        if self.released {
            return Err(CaptureError::StreamClosed);
        }
        let path = &self.frames[self.cursor % self.frames.len()];
        self.cursor = self.cursor.wrapping_add(1);
        image::open(path).map_err(|err| {
            warn!(frame = %path.display(), "failed to decode frame: {err}");
            CaptureError::Frame(format!("{}: {err}", path.display()))
        })
    }

    fn release(&mut self) {
        self.released = true;
        self.frames.clear();
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
