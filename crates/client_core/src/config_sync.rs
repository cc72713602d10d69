use std::sync::{Arc, Mutex};

use serde_json::Value;
use shared::domain::{AppConfig, ConfigSection};
use tracing::{info, warn};

use crate::{
    busy_gate::{BusyGate, GateHeld},
    error::WorkflowError,
    events::{EventSink, Panel, SessionEvent},
    lock_state,
    transport::AssistantApi,
};

pub const CONFIG_LOADED: &str = "Config loaded successfully.";
pub const CONFIG_LOAD_FAILED: &str = "Failed to load config.";
pub const CONFIG_SAVED: &str = "Config saved successfully!";
pub const CONFIG_SAVE_FAILED: &str = "Failed to save config.";

#[derive(Default)]
struct ConfigState {
    working: Option<AppConfig>,
    status: String,
}

/// Working copy of the server's [`AppConfig`]. The server is authoritative:
/// every successful load or save replaces the working copy wholesale.
pub struct ConfigSyncModel {
    api: Arc<dyn AssistantApi>,
    gate: BusyGate,
    events: EventSink,
    state: Mutex<ConfigState>,
}

impl ConfigSyncModel {
    pub fn new(api: Arc<dyn AssistantApi>, gate: BusyGate, events: EventSink) -> Self {
        Self {
            api,
            gate,
            events,
            state: Mutex::new(ConfigState::default()),
        }
    }

    pub fn working_copy(&self) -> Option<AppConfig> {
        lock_state(&self.state).working.clone()
    }

    pub fn is_loaded(&self) -> bool {
        lock_state(&self.state).working.is_some()
    }

    pub fn status(&self) -> String {
        lock_state(&self.state).status.clone()
    }

    /// Fetches the server config. A failure keeps whatever was held before
    /// (nothing, on first load).
    pub async fn load(&self) -> Result<AppConfig, WorkflowError> {
        let permit = self.gate.try_acquire("fetch_config")?;
        let result = self.api.fetch_config().await;

        let mut state = lock_state(&self.state);
        let outcome = match result {
            Ok(config) => {
                info!(model = %config.llm.model, "config: loaded");
                self.replace(&mut state, config.clone());
                self.set_status(&mut state, CONFIG_LOADED);
                Ok(config)
            }
            Err(err) => {
                warn!(error = %err, "config: load failed");
                self.set_status(&mut state, CONFIG_LOAD_FAILED);
                Err(err.into())
            }
        };
        drop(state);
        drop(permit);
        outcome
    }

    /// Local edit of one key; nothing is sent until [`Self::save`]. Refused
    /// while the gate is held, since a load or save replaces the working copy.
    pub fn update_field(
        &self,
        section: ConfigSection,
        key: &str,
        value: Value,
    ) -> Result<(), WorkflowError> {
        let mut state = lock_state(&self.state);
        if self.gate.is_busy() {
            return Err(GateHeld.into());
        }
        let working = state.working.as_mut().ok_or(WorkflowError::ConfigNotLoaded)?;
        working.set_field(section, key, value)?;
        Ok(())
    }

    /// Sends the whole working copy and adopts the server's echo. On failure
    /// the working copy keeps the user's edits.
    pub async fn save(&self) -> Result<AppConfig, WorkflowError> {
        let (snapshot, permit) = {
            let mut state = lock_state(&self.state);
            let snapshot = state.working.clone().ok_or(WorkflowError::ConfigNotLoaded)?;
            let permit = self.gate.try_acquire("save_config")?;
            self.set_status(&mut state, "Saving...");
            (snapshot, permit)
        };

        let result = self.api.save_config(&snapshot).await;

        let mut state = lock_state(&self.state);
        let outcome = match result {
            Ok(echoed) => {
                if echoed != snapshot {
                    info!("config: server adjusted the saved config");
                }
                self.replace(&mut state, echoed.clone());
                self.set_status(&mut state, CONFIG_SAVED);
                Ok(echoed)
            }
            Err(err) => {
                warn!(error = %err, "config: save failed");
                self.set_status(&mut state, CONFIG_SAVE_FAILED);
                Err(err.into())
            }
        };
        drop(state);
        drop(permit);
        outcome
    }

    fn replace(&self, state: &mut ConfigState, config: AppConfig) {
        state.working = Some(config.clone());
        self.events.emit(SessionEvent::ConfigReplaced(config));
    }

    fn set_status(&self, state: &mut ConfigState, message: &str) {
        state.status = message.to_string();
        self.events.status(Panel::Config, message);
    }
}

#[cfg(test)]
#[path = "tests/config_sync_tests.rs"]
mod tests;
