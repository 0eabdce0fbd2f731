//! Backend wire protocol.
//!
//! Request bodies serialize straight to the JSON the recognition server
//! expects. Responses are parsed once, at the boundary, into a closed union
//! per endpoint so callers never inspect untyped JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CapturedImage, Nim, RecognitionModel, RecognizedIdentity, Score};

pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("response body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("response is missing '{0}'")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyRequest {
    pub image: CapturedImage,
    pub model: RecognitionModel,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub nim: Nim,
    pub name: String,
    pub images: Vec<CapturedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadDatasetRequest {
    pub nim: Nim,
    pub images: Vec<CapturedImage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsResponse {
    Available { total_users: u64 },
    Unavailable { message: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    Recognized(RecognizedIdentity),
    Rejected { message: Option<String> },
}

/// Outcome of `/register` and `/upload-dataset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckResponse {
    Accepted { message: Option<String> },
    Rejected { message: Option<String> },
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    body: T,
}

impl<T> Envelope<T> {
    fn is_success(&self) -> Result<bool, ProtocolError> {
        let status = self
            .status
            .as_deref()
            .ok_or(ProtocolError::MissingField("status"))?;
        Ok(status == STATUS_SUCCESS)
    }

    fn message(&self) -> Option<String> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct StatsBody {
    #[serde(default)]
    total_users: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    #[serde(default)]
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    name: Option<String>,
    nim: Option<Score>,
    confidence: Option<Score>,
    distance: Option<Score>,
}

#[derive(Debug, Deserialize)]
struct EmptyBody {}

impl StatsResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Envelope<StatsBody> = serde_json::from_slice(bytes)?;
        if envelope.is_success()? {
            let total_users = envelope
                .body
                .total_users
                .ok_or(ProtocolError::MissingField("total_users"))?;
            Ok(Self::Available { total_users })
        } else {
            Ok(Self::Unavailable {
                message: envelope.message(),
            })
        }
    }
}

impl VerifyResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Envelope<VerifyBody> = serde_json::from_slice(bytes)?;
        if !envelope.is_success()? {
            return Ok(Self::Rejected {
                message: envelope.message(),
            });
        }

        let data = envelope.body.data.ok_or(ProtocolError::MissingField("data"))?;
        Ok(Self::Recognized(RecognizedIdentity {
            name: data.name.ok_or(ProtocolError::MissingField("data.name"))?,
            nim: data
                .nim
                .ok_or(ProtocolError::MissingField("data.nim"))?
                .into(),
            confidence: data
                .confidence
                .ok_or(ProtocolError::MissingField("data.confidence"))?,
            distance: data
                .distance
                .ok_or(ProtocolError::MissingField("data.distance"))?,
        }))
    }
}

impl AckResponse {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Envelope<EmptyBody> = serde_json::from_slice(bytes)?;
        let message = envelope.message();
        if envelope.is_success()? {
            Ok(Self::Accepted { message })
        } else {
            Ok(Self::Rejected { message })
        }
    }
}
