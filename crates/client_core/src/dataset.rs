//! Batch upload of existing photos for an already registered NIM.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use capture::{encode_file, preview_file, CaptureError, PREVIEW_MAX_DIMENSION};
use futures::{future::try_join_all, stream::FuturesUnordered, StreamExt};
use shared::{
    domain::{CapturedImage, Nim},
    error::WorkflowError,
    protocol::{AckResponse, UploadDatasetRequest},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{backend::RecognitionBackend, submission::SubmissionGate};

pub const DEFAULT_UPLOAD_SUCCESS: &str = "Dataset uploaded.";
pub const DEFAULT_UPLOAD_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSlot {
    id: Uuid,
    path: PathBuf,
    preview: Option<CapturedImage>,
}

impl BatchSlot {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preview(&self) -> Option<&CapturedImage> {
        self.preview.as_ref()
    }
}

pub struct DatasetUploader {
    backend: Arc<dyn RecognitionBackend>,
    slots: Mutex<Vec<BatchSlot>>,
    gate: SubmissionGate,
}

impl DatasetUploader {
    pub fn new(backend: Arc<dyn RecognitionBackend>) -> Self {
        Self {
            backend,
            slots: Mutex::new(Vec::new()),
            gate: SubmissionGate::default(),
        }
    }

    pub async fn files(&self) -> Vec<BatchSlot> {
        self.slots.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    pub fn is_submitting(&self) -> bool {
        self.gate.is_busy()
    }

    /// Appends the files to the batch, then renders their previews concurrently.
    ///
    /// Previews are matched to slots by id as they complete, so a slow
    /// decode never lands on a neighbouring file.
    pub async fn add_files<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let added: Vec<(Uuid, PathBuf)> = {
            let mut slots = self.slots.lock().await;
            paths
                .into_iter()
                .map(|path| {
                    let id = Uuid::new_v4();
                    slots.push(BatchSlot {
                        id,
                        path: path.clone(),
                        preview: None,
                    });
                    (id, path)
                })
                .collect()
        };

        let mut pending: FuturesUnordered<_> = added
            .iter()
            .cloned()
            .map(|(id, path)| async move { (id, render_preview(path).await) })
            .collect();

        while let Some((id, preview)) = pending.next().await {
            match preview {
                Ok(preview) => {
                    let mut slots = self.slots.lock().await;
                    if let Some(slot) = slots.iter_mut().find(|slot| slot.id == id) {
                        slot.preview = Some(preview);
                    } else {
                        debug!(%id, "preview finished for a removed file");
                    }
                }
                Err(err) => warn!(%id, "preview unavailable: {err}"),
            }
        }

        added.len()
    }

    /// Removes the file at `index` together with its preview.
    pub async fn remove_file(&self, index: usize) -> Result<BatchSlot, WorkflowError> {
        let mut slots = self.slots.lock().await;
        if index >= slots.len() {
            return Err(WorkflowError::InvalidIndex {
                index,
                len: slots.len(),
            });
        }
        Ok(slots.remove(index))
    }

    /// Encodes every file and uploads them as one batch for `nim`.
    ///
    /// Validation failures make no network call. On success the submitted
    /// files leave the batch; on failure the batch is untouched.
    pub async fn submit_batch(&self, nim: &str) -> Result<String, WorkflowError> {
        let _permit = self.gate.try_enter()?;

        let snapshot = self.files().await;
        if nim.trim().is_empty() || snapshot.is_empty() {
            return Err(WorkflowError::validation(
                "enter a NIM and choose at least one photo",
            ));
        }
        let nim = Nim::parse(nim)?;

        let images = try_join_all(snapshot.iter().map(|slot| encode(slot.path.clone()))).await?;
        info!(%nim, images = images.len(), "uploading dataset batch");

        let response = self
            .backend
            .upload_dataset(&UploadDatasetRequest {
                nim: nim.clone(),
                images,
            })
            .await
            .map_err(|err| {
                warn!(%nim, "dataset upload failed: {err}");
                WorkflowError::from(err)
            })?;

        match response {
            AckResponse::Accepted { message } => {
                let mut slots = self.slots.lock().await;
                slots.retain(|slot| !snapshot.iter().any(|sent| sent.id == slot.id));
                info!(%nim, "dataset batch accepted");
                Ok(message.unwrap_or_else(|| DEFAULT_UPLOAD_SUCCESS.to_string()))
            }
            AckResponse::Rejected { message } => {
                let message = message.unwrap_or_else(|| DEFAULT_UPLOAD_ERROR.to_string());
                warn!(%nim, %message, "dataset batch rejected");
                Err(WorkflowError::BackendRejected(message))
            }
        }
    }
}

async fn render_preview(path: PathBuf) -> Result<CapturedImage, CaptureError> {
    tokio::task::spawn_blocking(move || preview_file(&path, PREVIEW_MAX_DIMENSION))
        .await
        .map_err(|err| CaptureError::Frame(format!("preview task failed: {err}")))?
}

async fn encode(path: PathBuf) -> Result<CapturedImage, WorkflowError> {
    tokio::task::spawn_blocking(move || encode_file(&path))
        .await
        .map_err(|err| WorkflowError::validation(format!("file conversion task failed: {err}")))?
        .map_err(WorkflowError::from)
}

#[cfg(test)]
#[path = "tests/dataset_tests.rs"]
mod tests;
