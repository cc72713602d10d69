use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure body returned by the assistant service on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(Value::String(detail.into())),
        }
    }

    /// Human-readable detail, if the body carried one.
    ///
    /// Structured details (validation error lists) are rendered as compact JSON.
    pub fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigEditError {
    #[error("unknown config section: {0}")]
    UnknownSection(String),
    #[error("expected section.key, got {0:?}")]
    MalformedPath(String),
    #[error("config key must not be empty")]
    EmptyKey,
    #[error("config section {0} is not an object")]
    NotAnObject(&'static str),
    #[error("failed to encode config section: {0}")]
    Encode(serde_json::Error),
    #[error("invalid value for {section}.{key}: {source}")]
    InvalidValue {
        section: &'static str,
        key: String,
        source: serde_json::Error,
    },
}
