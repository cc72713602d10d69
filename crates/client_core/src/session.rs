//! Page-level orchestrator composing every workflow around one busy gate.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{AppConfig, ChatMessage, ConfigField},
    protocol::IngestResponse,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::{
    busy_gate::{BusyGate, GateHeld},
    chat_session::{ChatReply, ChatSessionModel},
    config_sync::ConfigSyncModel,
    error::WorkflowError,
    events::{EventSink, SessionEvent},
    file_batch::{FileBatchManager, PendingFile},
    summary::SummaryController,
    text_note::{NoteDraft, TextNoteController},
    transport::AssistantApi,
};

#[derive(Debug, Clone)]
pub enum UiAction {
    AddFiles(Vec<PendingFile>),
    RemoveFile(usize),
    UploadBatch,
    SetNoteTitle(String),
    SetNoteContent(String),
    SubmitNote,
    SetQuestion(String),
    SubmitQuestion,
    EditConfig { field: ConfigField, value: Value },
    SaveConfig,
    ReloadConfig,
    Summarize { text: String, detail: Option<String> },
}

impl UiAction {
    fn name(&self) -> &'static str {
        match self {
            Self::AddFiles(_) => "add_files",
            Self::RemoveFile(_) => "remove_file",
            Self::UploadBatch => "upload_batch",
            Self::SetNoteTitle(_) => "set_note_title",
            Self::SetNoteContent(_) => "set_note_content",
            Self::SubmitNote => "submit_note",
            Self::SetQuestion(_) => "set_question",
            Self::SubmitQuestion => "submit_question",
            Self::EditConfig { .. } => "edit_config",
            Self::SaveConfig => "save_config",
            Self::ReloadConfig => "reload_config",
            Self::Summarize { .. } => "summarize",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    BatchSize(usize),
    FileRemoved(Option<String>),
    Ingested(IngestResponse),
    Edited,
    Chat(ChatReply),
    ConfigReplaced(AppConfig),
    Summary(String),
}

/// Owned view of every workflow, for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub busy: bool,
    pub batch: Vec<String>,
    pub batch_status: String,
    pub note: NoteDraft,
    pub note_status: String,
    pub question: String,
    pub transcript: Vec<ChatMessage>,
    pub config: Option<AppConfig>,
    pub config_status: String,
    pub summary: Option<String>,
    pub summary_status: String,
}

pub struct AssistantSession {
    gate: BusyGate,
    events: EventSink,
    documents: FileBatchManager,
    notes: TextNoteController,
    chat: ChatSessionModel,
    config: ConfigSyncModel,
    summary: SummaryController,
}

impl AssistantSession {
    pub fn new(api: Arc<dyn AssistantApi>) -> Self {
        let gate = BusyGate::new();
        let events = EventSink::new();
        Self {
            documents: FileBatchManager::new(Arc::clone(&api), gate.clone(), events.clone()),
            notes: TextNoteController::new(Arc::clone(&api), gate.clone(), events.clone()),
            chat: ChatSessionModel::new(Arc::clone(&api), gate.clone(), events.clone()),
            config: ConfigSyncModel::new(Arc::clone(&api), gate.clone(), events.clone()),
            summary: SummaryController::new(api, gate.clone(), events.clone()),
            gate,
            events,
        }
    }

    /// Builds the session and performs the initial config load. A failed load
    /// is reported through the config status; the session is still usable.
    pub async fn start(api: Arc<dyn AssistantApi>) -> Self {
        let session = Self::new(api);
        if let Err(err) = session.config.load().await {
            warn!(error = %err, "session: initial config load failed");
        }
        session
    }

    pub fn documents(&self) -> &FileBatchManager {
        &self.documents
    }

    pub fn notes(&self) -> &TextNoteController {
        &self.notes
    }

    pub fn chat(&self) -> &ChatSessionModel {
        &self.chat
    }

    pub fn config(&self) -> &ConfigSyncModel {
        &self.config
    }

    pub fn summary(&self) -> &SummaryController {
        &self.summary
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn busy_updates(&self) -> watch::Receiver<bool> {
        self.gate.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Routes one user action. Every action is refused while a request is in
    /// flight.
    pub async fn dispatch(&self, action: UiAction) -> Result<ActionOutcome, WorkflowError> {
        let name = action.name();
        if self.gate.is_busy() {
            debug!(action = name, "session: action refused while busy");
            return Err(WorkflowError::Busy(GateHeld));
        }
        debug!(action = name, "session: routing action");

        match action {
            UiAction::AddFiles(files) => Ok(ActionOutcome::BatchSize(
                self.documents.add_files(files)?,
            )),
            UiAction::RemoveFile(index) => Ok(ActionOutcome::FileRemoved(
                self.documents
                    .remove_file(index)?
                    .map(|file| file.name().to_string()),
            )),
            UiAction::UploadBatch => Ok(ActionOutcome::Ingested(self.documents.submit().await?)),
            UiAction::SetNoteTitle(title) => {
                self.notes.set_title(title)?;
                Ok(ActionOutcome::Edited)
            }
            UiAction::SetNoteContent(content) => {
                self.notes.set_content(content)?;
                Ok(ActionOutcome::Edited)
            }
            UiAction::SubmitNote => Ok(ActionOutcome::Ingested(self.notes.submit().await?)),
            UiAction::SetQuestion(question) => {
                self.chat.set_input(question);
                Ok(ActionOutcome::Edited)
            }
            UiAction::SubmitQuestion => Ok(ActionOutcome::Chat(self.chat.submit().await?)),
            UiAction::EditConfig { field, value } => {
                self.config.update_field(field.section, &field.key, value)?;
                Ok(ActionOutcome::Edited)
            }
            UiAction::SaveConfig => Ok(ActionOutcome::ConfigReplaced(self.config.save().await?)),
            UiAction::ReloadConfig => {
                Ok(ActionOutcome::ConfigReplaced(self.config.load().await?))
            }
            UiAction::Summarize { text, detail } => Ok(ActionOutcome::Summary(
                self.summary.summarize(&text, detail.as_deref()).await?,
            )),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            busy: self.gate.is_busy(),
            batch: self.documents.file_names(),
            batch_status: self.documents.status(),
            note: self.notes.draft(),
            note_status: self.notes.status(),
            question: self.chat.input(),
            transcript: self.chat.transcript(),
            config: self.config.working_copy(),
            config_status: self.config.status(),
            summary: self.summary.latest(),
            summary_status: self.summary.status(),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
