use std::fmt;

use shared::domain::{AppConfig, ChatMessage};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Status line owner. Chat has none: its failures land in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Documents,
    Notes,
    Config,
    Summary,
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Documents => "documents",
            Self::Notes => "notes",
            Self::Config => "config",
            Self::Summary => "summary",
        })
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StatusChanged { panel: Panel, message: String },
    BatchChanged { names: Vec<String> },
    DraftCleared,
    TranscriptAppended(ChatMessage),
    ConfigReplaced(AppConfig),
}

#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscriber is fine; rendering may poll snapshots instead.
        let _ = self.tx.send(event);
    }

    pub fn status(&self, panel: Panel, message: impl Into<String>) {
        self.emit(SessionEvent::StatusChanged {
            panel,
            message: message.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
