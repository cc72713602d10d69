use std::sync::{Arc, Mutex};

use shared::protocol::{IngestResponse, TextSubmission};
use tracing::{info, warn};

use crate::{
    busy_gate::{BusyGate, GateHeld},
    error::{WorkflowError, NOTE_FIELDS_REQUIRED},
    events::{EventSink, Panel, SessionEvent},
    lock_state,
    transport::AssistantApi,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }
}

struct NoteState {
    draft: NoteDraft,
    status: String,
}

pub struct TextNoteController {
    api: Arc<dyn AssistantApi>,
    gate: BusyGate,
    events: EventSink,
    state: Mutex<NoteState>,
}

impl TextNoteController {
    pub fn new(api: Arc<dyn AssistantApi>, gate: BusyGate, events: EventSink) -> Self {
        Self {
            api,
            gate,
            events,
            state: Mutex::new(NoteState {
                draft: NoteDraft::default(),
                status: String::new(),
            }),
        }
    }

    /// Draft edits are refused while the gate is held, since a successful
    /// submission clears the draft it sent.
    pub fn set_title(&self, title: impl Into<String>) -> Result<(), WorkflowError> {
        let mut state = lock_state(&self.state);
        if self.gate.is_busy() {
            return Err(GateHeld.into());
        }
        state.draft.title = title.into();
        Ok(())
    }

    pub fn set_content(&self, content: impl Into<String>) -> Result<(), WorkflowError> {
        let mut state = lock_state(&self.state);
        if self.gate.is_busy() {
            return Err(GateHeld.into());
        }
        state.draft.content = content.into();
        Ok(())
    }

    pub fn draft(&self) -> NoteDraft {
        lock_state(&self.state).draft.clone()
    }

    pub fn status(&self) -> String {
        lock_state(&self.state).status.clone()
    }

    /// Sends the draft as a note. The draft is cleared only on success so a
    /// failed submission can be retried as-is.
    pub async fn submit(&self) -> Result<IngestResponse, WorkflowError> {
        let (submission, permit) = {
            let mut state = lock_state(&self.state);
            if !state.draft.is_complete() {
                self.set_status(&mut state, NOTE_FIELDS_REQUIRED);
                return Err(WorkflowError::Validation(NOTE_FIELDS_REQUIRED));
            }
            let permit = self.gate.try_acquire("submit_text")?;
            self.set_status(&mut state, "Submitting text...");
            let submission = TextSubmission {
                title: state.draft.title.clone(),
                content: state.draft.content.clone(),
            };
            (submission, permit)
        };

        let result = self.api.submit_text(&submission).await;

        let mut state = lock_state(&self.state);
        let outcome = match result {
            Ok(response) => {
                info!(
                    title = %submission.title,
                    chunks_loaded = response.chunks_loaded,
                    "notes: text ingested"
                );
                state.draft = NoteDraft::default();
                self.events.emit(SessionEvent::DraftCleared);
                self.set_status(&mut state, response.message.clone());
                Ok(response)
            }
            Err(err) => {
                warn!(error = %err, "notes: text submission failed");
                self.set_status(&mut state, format!("Error: {}", err.user_message()));
                Err(err.into())
            }
        };
        drop(state);
        drop(permit);
        outcome
    }

    fn set_status(&self, state: &mut NoteState, message: impl Into<String>) {
        state.status = message.into();
        self.events.status(Panel::Notes, state.status.clone());
    }
}
