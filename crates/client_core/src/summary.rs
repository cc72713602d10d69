use std::sync::{Arc, Mutex};

use shared::protocol::{SummarizeRequest, DEFAULT_SUMMARY_DETAIL};
use tracing::warn;

use crate::{
    busy_gate::BusyGate,
    error::{WorkflowError, EMPTY_SUMMARY_TEXT},
    events::{EventSink, Panel},
    lock_state,
    transport::AssistantApi,
};

#[derive(Default)]
struct SummaryState {
    latest: Option<String>,
    status: String,
}

pub struct SummaryController {
    api: Arc<dyn AssistantApi>,
    gate: BusyGate,
    events: EventSink,
    state: Mutex<SummaryState>,
}

impl SummaryController {
    pub fn new(api: Arc<dyn AssistantApi>, gate: BusyGate, events: EventSink) -> Self {
        Self {
            api,
            gate,
            events,
            state: Mutex::new(SummaryState::default()),
        }
    }

    pub fn latest(&self) -> Option<String> {
        lock_state(&self.state).latest.clone()
    }

    pub fn status(&self) -> String {
        lock_state(&self.state).status.clone()
    }

    /// `detail` describes the wanted shape ("three bullet points"); defaults
    /// to a concise paragraph.
    pub async fn summarize(
        &self,
        text: &str,
        detail: Option<&str>,
    ) -> Result<String, WorkflowError> {
        let permit = {
            let mut state = lock_state(&self.state);
            if text.trim().is_empty() {
                self.set_status(&mut state, EMPTY_SUMMARY_TEXT);
                return Err(WorkflowError::Validation(EMPTY_SUMMARY_TEXT));
            }
            let permit = self.gate.try_acquire("summarize")?;
            self.set_status(&mut state, "Summarizing...");
            permit
        };

        let request = SummarizeRequest {
            text: text.to_string(),
            detail: detail
                .map(str::trim)
                .filter(|detail| !detail.is_empty())
                .unwrap_or(DEFAULT_SUMMARY_DETAIL)
                .to_string(),
        };
        let result = self.api.summarize(&request).await;

        let mut state = lock_state(&self.state);
        let outcome = match result {
            Ok(response) => {
                state.latest = Some(response.summary.clone());
                self.set_status(&mut state, "Summary ready.");
                Ok(response.summary)
            }
            Err(err) => {
                warn!(error = %err, "summary: request failed");
                self.set_status(&mut state, format!("Error: {}", err.user_message()));
                Err(err.into())
            }
        };
        drop(state);
        drop(permit);
        outcome
    }

    fn set_status(&self, state: &mut SummaryState, message: impl Into<String>) {
        state.status = message.into();
        self.events.status(Panel::Summary, state.status.clone());
    }
}
