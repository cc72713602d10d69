//! Staged document batch for `/upload_and_process`.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use shared::protocol::IngestResponse;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    busy_gate::{BusyGate, GateHeld},
    error::{WorkflowError, NO_FILES_SELECTED},
    events::{EventSink, Panel, SessionEvent},
    lock_state,
    transport::AssistantApi,
};

pub const MAX_BATCH: usize = 5;
pub const INITIAL_BATCH_STATUS: &str = "Please select up to 5 PDFs to begin.";

/// A selected file: display name plus its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("{} does not name a file", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("You can only upload a maximum of {max} PDFs. You tried to add {excess} more.")]
pub struct BatchError {
    pub current: usize,
    pub attempted: usize,
    pub excess: usize,
    pub max: usize,
}

struct BatchState {
    files: Vec<PendingFile>,
    status: String,
}

pub struct FileBatchManager {
    api: Arc<dyn AssistantApi>,
    gate: BusyGate,
    events: EventSink,
    state: Mutex<BatchState>,
}

impl FileBatchManager {
    pub fn new(api: Arc<dyn AssistantApi>, gate: BusyGate, events: EventSink) -> Self {
        Self {
            api,
            gate,
            events,
            state: Mutex::new(BatchState {
                files: Vec::new(),
                status: INITIAL_BATCH_STATUS.to_string(),
            }),
        }
    }

    /// Appends `new_files` after the current batch, or rejects all of them if
    /// the batch would exceed [`MAX_BATCH`]. Returns the new batch size.
    ///
    /// Refused while the gate is held: a successful upload replaces the whole
    /// batch, so files staged mid-flight would be lost.
    pub fn add_files(&self, new_files: Vec<PendingFile>) -> Result<usize, WorkflowError> {
        let mut state = lock_state(&self.state);
        if self.gate.is_busy() {
            return Err(GateHeld.into());
        }
        let current = state.files.len();
        let total = current + new_files.len();

        if total > MAX_BATCH {
            let err = BatchError {
                current,
                attempted: new_files.len(),
                excess: total - MAX_BATCH,
                max: MAX_BATCH,
            };
            self.set_status(&mut state, err.to_string());
            return Err(err.into());
        }

        state.files.extend(new_files);
        self.set_status(&mut state, format!("Selected {total} file(s)."));
        self.emit_batch(&state);
        Ok(total)
    }

    /// Removes the file at `index`; out-of-range indices are ignored. Refused
    /// while the gate is held.
    pub fn remove_file(&self, index: usize) -> Result<Option<PendingFile>, WorkflowError> {
        let mut state = lock_state(&self.state);
        if self.gate.is_busy() {
            return Err(GateHeld.into());
        }
        if index >= state.files.len() {
            return Ok(None);
        }

        let removed = state.files.remove(index);
        let count = state.files.len();
        self.set_status(&mut state, format!("Selected {count} file(s)."));
        self.emit_batch(&state);
        Ok(Some(removed))
    }

    pub async fn submit(&self) -> Result<IngestResponse, WorkflowError> {
        let (files, permit) = {
            let mut state = lock_state(&self.state);
            if state.files.is_empty() {
                self.set_status(&mut state, NO_FILES_SELECTED);
                return Err(WorkflowError::Validation(NO_FILES_SELECTED));
            }
            let permit = self.gate.try_acquire("upload_and_process")?;
            self.set_status(&mut state, "Uploading and processing...");
            (state.files.clone(), permit)
        };

        let result = self.api.upload_documents(&files).await;

        let mut state = lock_state(&self.state);
        let outcome = match result {
            Ok(response) => {
                info!(
                    files = files.len(),
                    chunks_loaded = response.chunks_loaded,
                    "ingest: batch processed"
                );
                state.files.clear();
                self.set_status(&mut state, response.message.clone());
                self.emit_batch(&state);
                Ok(response)
            }
            Err(err) => {
                warn!(error = %err, "ingest: batch upload failed");
                self.set_status(&mut state, format!("Error: {}", err.user_message()));
                Err(err.into())
            }
        };
        drop(state);
        drop(permit);
        outcome
    }

    pub fn file_names(&self) -> Vec<String> {
        let state = lock_state(&self.state);
        state.files.iter().map(|file| file.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock_state(&self.state).files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> String {
        lock_state(&self.state).status.clone()
    }

    fn set_status(&self, state: &mut BatchState, message: impl Into<String>) {
        state.status = message.into();
        self.events.status(Panel::Documents, state.status.clone());
    }

    fn emit_batch(&self, state: &BatchState) {
        self.events.emit(SessionEvent::BatchChanged {
            names: state.files.iter().map(|file| file.name.clone()).collect(),
        });
    }
}

#[cfg(test)]
#[path = "tests/file_batch_tests.rs"]
mod tests;
