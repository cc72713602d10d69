use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigEditError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    512
}

fn default_top_k() -> u32 {
    3
}

/// Language-model section of the assistant configuration.
///
/// Keys the client does not model (the server keeps e.g. `host` here) are
/// carried in `extra` so a save never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSettings {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub rag: RagSettings,
}

impl AppConfig {
    /// Merges `{key: value}` into one section, leaving every other key and
    /// section untouched. On error the config is unchanged.
    pub fn set_field(
        &mut self,
        section: ConfigSection,
        key: &str,
        value: Value,
    ) -> Result<(), ConfigEditError> {
        match section {
            ConfigSection::Llm => merge_key(&mut self.llm, section, key, value),
            ConfigSection::Embedding => merge_key(&mut self.embedding, section, key, value),
            ConfigSection::Rag => merge_key(&mut self.rag, section, key, value),
        }
    }
}

fn merge_key<T>(
    target: &mut T,
    section: ConfigSection,
    key: &str,
    value: Value,
) -> Result<(), ConfigEditError>
where
    T: Serialize + DeserializeOwned,
{
    if key.trim().is_empty() {
        return Err(ConfigEditError::EmptyKey);
    }

    let mut fields = match serde_json::to_value(&*target).map_err(ConfigEditError::Encode)? {
        Value::Object(fields) => fields,
        _ => return Err(ConfigEditError::NotAnObject(section.as_str())),
    };
    fields.insert(key.to_string(), value);

    *target = serde_json::from_value(Value::Object(fields)).map_err(|source| {
        ConfigEditError::InvalidValue {
            section: section.as_str(),
            key: key.to_string(),
            source,
        }
    })?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSection {
    Llm,
    Embedding,
    Rag,
}

impl ConfigSection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Embedding => "embedding",
            Self::Rag => "rag",
        }
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigSection {
    type Err = ConfigEditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "embedding" => Ok(Self::Embedding),
            "rag" => Ok(Self::Rag),
            other => Err(ConfigEditError::UnknownSection(other.to_string())),
        }
    }
}

/// A dotted `section.key` path such as `llm.temperature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigField {
    pub section: ConfigSection,
    pub key: String,
}

impl FromStr for ConfigField {
    type Err = ConfigEditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (section, key) = s
            .split_once('.')
            .ok_or_else(|| ConfigEditError::MalformedPath(s.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigEditError::MalformedPath(s.to_string()));
        }
        Ok(Self {
            section: section.parse()?,
            key: key.to_string(),
        })
    }
}
