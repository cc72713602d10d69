use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod busy_gate;
pub mod chat_session;
pub mod config_sync;
pub mod error;
pub mod events;
pub mod file_batch;
pub mod session;
pub mod settings;
pub mod summary;
pub mod text_note;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use busy_gate::{BusyGate, BusyPermit, GateHeld};
pub use chat_session::{ChatReply, ChatSessionModel};
pub use config_sync::ConfigSyncModel;
pub use error::{ClientError, WorkflowError};
pub use events::{Panel, SessionEvent};
pub use file_batch::{BatchError, FileBatchManager, PendingFile, MAX_BATCH};
pub use session::{ActionOutcome, AssistantSession, SessionSnapshot, UiAction};
pub use settings::{load_settings, ClientSettings};
pub use summary::SummaryController;
pub use text_note::{NoteDraft, TextNoteController};
pub use transport::{AssistantApi, HttpAssistantApi};

/// Workflow state is only locked for short synchronous sections, never across
/// an await, so a poisoned lock still holds consistent data.
pub(crate) fn lock_state<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
