use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, WorkflowError};

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Student identification number, the external identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nim(String);

impl Nim {
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WorkflowError::validation("NIM is required"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub nim: Nim,
    pub name: String,
}

impl Identity {
    /// Builds an identity from operator input; both fields must be non-empty.
    pub fn parse(nim: &str, name: &str) -> Result<Self, WorkflowError> {
        let name = name.trim();
        if nim.trim().is_empty() || name.is_empty() {
            return Err(WorkflowError::validation("NIM and name are both required"));
        }
        Ok(Self {
            nim: Nim::parse(nim)?,
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionModel {
    #[default]
    Facenet,
    Facenet512,
}

impl RecognitionModel {
    pub const ALL: [RecognitionModel; 2] = [RecognitionModel::Facenet, RecognitionModel::Facenet512];

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Facenet => "facenet",
            Self::Facenet512 => "facenet512",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Facenet => "Facenet",
            Self::Facenet512 => "Facenet512",
        }
    }
}

impl fmt::Display for RecognitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for RecognitionModel {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.wire_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                WorkflowError::validation(format!(
                    "unknown recognition model '{s}' (expected facenet or facenet512)"
                ))
            })
    }
}

/// Backend-reported metric kept as text; the backend may send a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScoreRepr", into = "String")]
pub struct Score(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreRepr {
    Text(String),
    Number(serde_json::Number),
}

impl From<ScoreRepr> for Score {
    fn from(value: ScoreRepr) -> Self {
        match value {
            ScoreRepr::Text(text) => Self(text),
            ScoreRepr::Number(number) => Self(number.to_string()),
        }
    }
}

impl From<Score> for String {
    fn from(value: Score) -> Self {
        value.0
    }
}

impl Score {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric reading of the score, tolerating a trailing percent sign.
    pub fn as_f64(&self) -> Option<f64> {
        self.0
            .trim()
            .trim_end_matches('%')
            .trim_end()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A still image as a `data:<mime>;base64,<payload>` string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapturedImage(String);

impl CapturedImage {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!(
            "{DATA_URL_PREFIX}{mime_type}{BASE64_MARKER}{}",
            STANDARD.encode(bytes)
        ))
    }

    pub fn parse(data_url: impl Into<String>) -> Result<Self, WorkflowError> {
        let data_url = data_url.into();
        let Some(rest) = data_url.strip_prefix(DATA_URL_PREFIX) else {
            return Err(WorkflowError::validation("image is not a data URL"));
        };
        let Some((mime, payload)) = rest.split_once(BASE64_MARKER) else {
            return Err(WorkflowError::validation("image data URL is not base64 encoded"));
        };
        if mime.is_empty() || payload.is_empty() {
            return Err(WorkflowError::validation("image data URL is empty"));
        }
        Ok(Self(data_url))
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix(DATA_URL_PREFIX)
            .and_then(|rest| rest.split_once(BASE64_MARKER))
            .map(|(mime, _)| mime)
            .unwrap_or_default()
    }

    pub fn payload(&self) -> &str {
        self.0
            .split_once(BASE64_MARKER)
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.payload())
    }

    pub fn decoded_len(&self) -> usize {
        base64::decoded_len_estimate(self.payload().len())
    }
}

impl TryFrom<String> for CapturedImage {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CapturedImage> for String {
    fn from(value: CapturedImage) -> Self {
        value.0
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("mime_type", &self.mime_type())
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedIdentity {
    pub name: String,
    pub nim: String,
    pub confidence: Score,
    pub distance: Score,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceResult {
    Success {
        identity: RecognizedIdentity,
        model: RecognitionModel,
        observed_at: DateTime<Utc>,
    },
    Failure {
        kind: ErrorKind,
        reason: String,
    },
}

impl AttendanceResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn log_entry(&self) -> Option<ActivityLogEntry> {
        match self {
            Self::Success {
                identity,
                model,
                observed_at,
            } => Some(ActivityLogEntry {
                name: identity.name.clone(),
                nim: identity.nim.clone(),
                confidence: identity.confidence.clone(),
                distance: identity.distance.clone(),
                model: *model,
                timestamp: *observed_at,
            }),
            Self::Failure { .. } => None,
        }
    }
}

/// Persisted snapshot of one successful attendance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub name: String,
    pub nim: String,
    pub confidence: Score,
    pub distance: Score,
    pub model: RecognitionModel,
    pub timestamp: DateTime<Utc>,
}
