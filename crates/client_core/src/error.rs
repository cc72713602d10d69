use std::fmt;

use serde_json::Value;
use shared::error::{ConfigEditError, ErrorBody};
use thiserror::Error;

use crate::{busy_gate::GateHeld, file_batch::BatchError};

pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    IngestDocuments,
    SubmitText,
    Chat,
    FetchConfig,
    SaveConfig,
    Summarize,
    Health,
}

impl Operation {
    /// Message surfaced when a failure body parses but names no `detail`.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Self::IngestDocuments => "Upload failed",
            Self::SubmitText => "Text submission failed",
            Self::Chat => "Chat request failed",
            Self::FetchConfig => "Failed to fetch config",
            Self::SaveConfig => "Failed to save config",
            Self::Summarize => "Summarization failed",
            Self::Health => "Service unavailable",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IngestDocuments => "upload_and_process",
            Self::SubmitText => "submit_text",
            Self::Chat => "chat",
            Self::FetchConfig => "fetch_config",
            Self::SaveConfig => "save_config",
            Self::Summarize => "summarize",
            Self::Health => "health",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureBody {
    Detail(String),
    NoDetail,
    Unparseable,
}

impl FailureBody {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => serde_json::from_value::<ErrorBody>(value)
                .ok()
                .and_then(|body| body.detail_message())
                .map_or(Self::NoDetail, Self::Detail),
            Ok(_) => Self::NoDetail,
            Err(_) => Self::Unparseable,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{operation}: invalid endpoint url: {source}")]
    Endpoint {
        operation: Operation,
        source: url::ParseError,
    },
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: Operation,
        source: reqwest::Error,
    },
    #[error("{operation}: server returned status {status}")]
    Server {
        operation: Operation,
        status: u16,
        body: FailureBody,
    },
    #[error("{operation}: malformed response body: {source}")]
    Decode {
        operation: Operation,
        source: serde_json::Error,
    },
}

impl ClientError {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Endpoint { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Server { operation, .. }
            | Self::Decode { operation, .. } => *operation,
        }
    }

    /// The text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Server {
                body: FailureBody::Detail(detail),
                ..
            } => detail.clone(),
            Self::Server {
                operation,
                body: FailureBody::NoDetail,
                ..
            } => operation.fallback_message().to_string(),
            Self::Server {
                body: FailureBody::Unparseable,
                ..
            }
            | Self::Decode { .. } => UNKNOWN_ERROR.to_string(),
            Self::Transport { source, .. } => source.to_string(),
            Self::Endpoint { source, .. } => source.to_string(),
        }
    }
}

pub const NO_FILES_SELECTED: &str = "No files selected!";
pub const NOTE_FIELDS_REQUIRED: &str = "Both title and content are required.";
pub const EMPTY_QUESTION: &str = "Question must not be empty.";
pub const EMPTY_SUMMARY_TEXT: &str = "Text to summarize is required.";

/// Why a user action did not run or did not succeed. Every variant is raised
/// after the owning workflow has already applied its status/transcript update.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Busy(#[from] GateHeld),
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("configuration has not been loaded")]
    ConfigNotLoaded,
    #[error(transparent)]
    ConfigEdit(#[from] ConfigEditError),
    #[error("{}", .0.user_message())]
    Request(#[from] ClientError),
}
