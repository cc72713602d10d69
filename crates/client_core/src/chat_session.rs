//! Chat transcript with optimistic user turns.
//!
//! A turn appends the user's question before the request is sent, then settles
//! with exactly one assistant entry: the answer, or a synthetic error message.
//! Settling happens in [`PendingTurn`], so a cancelled request still closes
//! its turn before the busy gate is released.

use std::sync::{Arc, Mutex};

use shared::{domain::ChatMessage, protocol::ChatRequest};
use tracing::{info, warn};

use crate::{
    busy_gate::{BusyGate, BusyPermit},
    error::{WorkflowError, EMPTY_QUESTION},
    events::{EventSink, SessionEvent},
    lock_state,
    transport::AssistantApi,
};

pub const CHAT_ERROR_PREFIX: &str = "Sorry, an error occurred: ";
const CANCELLED_REASON: &str = "the request was cancelled before an answer arrived";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Answered(String),
    Failed(String),
}

#[derive(Default)]
struct ChatState {
    transcript: Vec<ChatMessage>,
    input: String,
}

pub struct ChatSessionModel {
    api: Arc<dyn AssistantApi>,
    gate: BusyGate,
    events: EventSink,
    state: Mutex<ChatState>,
}

impl ChatSessionModel {
    pub fn new(api: Arc<dyn AssistantApi>, gate: BusyGate, events: EventSink) -> Self {
        Self {
            api,
            gate,
            events,
            state: Mutex::new(ChatState::default()),
        }
    }

    pub fn set_input(&self, question: impl Into<String>) {
        lock_state(&self.state).input = question.into();
    }

    pub fn input(&self) -> String {
        lock_state(&self.state).input.clone()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        lock_state(&self.state).transcript.clone()
    }

    /// Sends the current input as a question.
    ///
    /// Blank input or a held gate returns `Err` and leaves everything
    /// untouched. Request failures are not errors here: they settle the turn
    /// with an assistant error entry and come back as [`ChatReply::Failed`].
    pub async fn submit(&self) -> Result<ChatReply, WorkflowError> {
        let (question, turn) = {
            let mut state = lock_state(&self.state);
            if state.input.trim().is_empty() {
                return Err(WorkflowError::Validation(EMPTY_QUESTION));
            }
            let permit = self.gate.try_acquire("chat")?;
            let question = std::mem::take(&mut state.input);
            self.append(&mut state, ChatMessage::user(question.clone()));
            (question, PendingTurn::new(self, permit))
        };

        match self.api.chat(&ChatRequest { question }).await {
            Ok(response) => {
                info!(answer_len = response.answer.len(), "chat: answer received");
                turn.settle(ChatMessage::assistant(response.answer.clone()));
                Ok(ChatReply::Answered(response.answer))
            }
            Err(err) => {
                warn!(error = %err, "chat: request failed");
                let reason = err.user_message();
                turn.settle(ChatMessage::assistant(format!("{CHAT_ERROR_PREFIX}{reason}")));
                Ok(ChatReply::Failed(reason))
            }
        }
    }

    fn append(&self, state: &mut ChatState, message: ChatMessage) {
        state.transcript.push(message.clone());
        self.events.emit(SessionEvent::TranscriptAppended(message));
    }
}

/// An outstanding turn. Holds the busy permit until the assistant entry is in
/// the transcript.
struct PendingTurn<'a> {
    model: &'a ChatSessionModel,
    permit: Option<BusyPermit>,
    settled: bool,
}

impl<'a> PendingTurn<'a> {
    fn new(model: &'a ChatSessionModel, permit: BusyPermit) -> Self {
        Self {
            model,
            permit: Some(permit),
            settled: false,
        }
    }

    fn settle(mut self, reply: ChatMessage) {
        self.close(reply);
    }

    fn close(&mut self, reply: ChatMessage) {
        {
            let mut state = lock_state(&self.model.state);
            self.model.append(&mut state, reply);
        }
        self.settled = true;
        drop(self.permit.take());
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("chat: turn abandoned before settling");
            self.close(ChatMessage::assistant(format!(
                "{CHAT_ERROR_PREFIX}{CANCELLED_REASON}"
            )));
        }
    }
}

#[cfg(test)]
#[path = "tests/chat_session_tests.rs"]
mod tests;
