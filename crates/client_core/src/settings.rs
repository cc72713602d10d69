use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const SETTINGS_FILE: &str = "assistant.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse settings file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid backend url '{raw}': {source}")]
    InvalidUrl { raw: String, source: url::ParseError },
    #[error("backend url must use http or https, got '{0}'")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub backend_url: Url,
}

impl ClientSettings {
    pub fn with_backend_url(mut self, raw: &str) -> Result<Self, SettingsError> {
        self.backend_url = parse_backend_url(raw)?;
        Ok(self)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    backend_url: Option<String>,
}

/// Settings from `path` (or `assistant.toml` in the working directory when it
/// exists), then `ASSISTANT_BACKEND_URL`, then `APP__BACKEND_URL`.
pub fn load_settings(path: Option<&Path>) -> Result<ClientSettings, SettingsError> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let file = match path {
        Some(path) => read_file_settings(path)?,
        None => {
            let default_path = Path::new(SETTINGS_FILE);
            if default_path.exists() {
                read_file_settings(default_path)?
            } else {
                FileSettings::default()
            }
        }
    };

    let mut raw_url = file.backend_url;
    if let Some(v) = env("ASSISTANT_BACKEND_URL") {
        raw_url = Some(v);
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        raw_url = Some(v);
    }

    let raw = raw_url
        .filter(|raw| !raw.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    Ok(ClientSettings {
        backend_url: parse_backend_url(&raw)?,
    })
}

fn read_file_settings(path: &Path) -> Result<FileSettings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_backend_url(raw: &str) -> Result<Url, SettingsError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|source| SettingsError::InvalidUrl {
        raw: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SettingsError::UnsupportedScheme(other.to_string())),
    }
}
