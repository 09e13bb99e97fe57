use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::analysis::{is_response_incomplete, AnalysisClient, AnalysisMode, AnalysisRequest};
use crate::browser::Browser;
use crate::config::AssistantConfig;
use crate::handoff::{compose_input, HandoffSlot};
use crate::keyboard::KeyEvent;
use crate::login::{LoginState, LoginStore};
use crate::messaging::{Delivery, Request};
use crate::storage::EphemeralStorage;

pub const EMPTY_INPUT_ERROR: &str = "Please enter some code to analyze.";
pub const INIT_FAILURE_MESSAGE: &str =
    "Failed to initialize the extension. Please refresh and try again.";

/// Text shown in place of the panel when it could not start.
pub fn initialization_failed(err: &anyhow::Error) -> String {
    format!("❌ Extension Error\n{}\nError: {}", INIT_FAILURE_MESSAGE, err)
}

/// Result area of one mode. Every submission restarts it from `Loading`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldState {
    #[default]
    Idle,
    Loading,
    Result {
        title: String,
        text: String,
        /// The response looked cut off. Shown as a warning only.
        incomplete: bool,
    },
    Error(String),
}

#[derive(Debug, Clone, Default)]
struct FieldSlot {
    input: String,
    state: FieldState,
}

/// Where the inputs were pre-filled from when the panel opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefill {
    /// A fresh hand-off payload; every mode input was filled.
    Handoff,
    /// The active tab answered a live query; only the active input was filled.
    LiveTab,
    Nothing,
}

struct PanelState {
    active: AnalysisMode,
    fields: HashMap<AnalysisMode, FieldSlot>,
}

/// The analysis popup: one input and result area per mode.
pub struct AnalysisPanel {
    handoff: HandoffSlot,
    login: LoginStore,
    browser: Arc<dyn Browser>,
    client: AnalysisClient,
    freshness_ms: u64,
    state: Mutex<PanelState>,
}

impl AnalysisPanel {
    pub fn new(
        browser: Arc<dyn Browser>,
        local: Arc<dyn EphemeralStorage>,
        page: Arc<dyn EphemeralStorage>,
        client: AnalysisClient,
        config: &AssistantConfig,
    ) -> Self {
        let fields = AnalysisMode::ALL
            .iter()
            .map(|mode| (*mode, FieldSlot::default()))
            .collect();
        Self {
            handoff: HandoffSlot::new(local),
            login: LoginStore::new(page),
            browser,
            client,
            freshness_ms: config.freshness_ms,
            state: Mutex::new(PanelState {
                active: AnalysisMode::Hints,
                fields,
            }),
        }
    }

    /// Pre-fills the inputs from a fresh hand-off payload, or from a live
    /// query to the active tab. Failures leave the inputs untouched.
    pub async fn load_captured(&self) -> Prefill {
        if let Some(payload) = self.handoff.take_if_fresh(self.freshness_ms) {
            let text = payload.input_text();
            let mut state = self.state.lock();
            for field in state.fields.values_mut() {
                field.input = text.clone();
            }
            info!("📋 Pre-filled all inputs from the captured payload");
            return Prefill::Handoff;
        }

        let tab = match self.browser.active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                debug!("No active tab to query: {}", e);
                return Prefill::Nothing;
            }
        };
        match self.browser.send_tab_message(tab.id, Request::GetLeetCodeContext).await {
            Delivery::Delivered(response) => {
                let selected = response.selected_text().unwrap_or_default();
                let code = response.editor_code().unwrap_or_default();
                if selected.is_empty() && code.is_empty() {
                    return Prefill::Nothing;
                }
                let text = compose_input(selected, code);
                let mut state = self.state.lock();
                let active = state.active;
                if let Some(field) = state.fields.get_mut(&active) {
                    field.input = text;
                }
                info!("📋 Pre-filled the {} input from tab {}", active, tab.id);
                Prefill::LiveTab
            }
            Delivery::Unavailable(reason) => {
                debug!("Could not get context from content script: {}", reason);
                Prefill::Nothing
            }
        }
    }

    pub fn active_mode(&self) -> AnalysisMode {
        self.state.lock().active
    }

    pub fn switch_tab(&self, mode: AnalysisMode) {
        self.state.lock().active = mode;
    }

    pub fn input(&self, mode: AnalysisMode) -> String {
        self.state
            .lock()
            .fields
            .get(&mode)
            .map(|f| f.input.clone())
            .unwrap_or_default()
    }

    pub fn set_input(&self, mode: AnalysisMode, text: impl Into<String>) {
        if let Some(field) = self.state.lock().fields.get_mut(&mode) {
            field.input = text.into();
        }
    }

    pub fn clear(&self, mode: AnalysisMode) {
        self.set_input(mode, String::new());
    }

    pub fn char_count(&self, mode: AnalysisMode) -> String {
        format!("{} characters", self.input(mode).chars().count())
    }

    pub fn field_state(&self, mode: AnalysisMode) -> FieldState {
        self.state
            .lock()
            .fields
            .get(&mode)
            .map(|f| f.state.clone())
            .unwrap_or_default()
    }

    fn set_state(&self, mode: AnalysisMode, new_state: FieldState) {
        if let Some(field) = self.state.lock().fields.get_mut(&mode) {
            field.state = new_state;
        }
    }

    /// Submits the mode's input and records the outcome in its result area.
    /// Only that mode's slot is touched, so modes can run concurrently.
    pub async fn analyze(&self, mode: AnalysisMode) -> FieldState {
        let code = self.input(mode).trim().to_string();
        if code.is_empty() {
            let state = FieldState::Error(EMPTY_INPUT_ERROR.to_string());
            self.set_state(mode, state.clone());
            return state;
        }

        self.set_state(mode, FieldState::Loading);
        let request = AnalysisRequest::new(mode, &code, self.login.email());

        let outcome = match self.client.ask(&request).await {
            Ok(text) => {
                let incomplete = is_response_incomplete(Some(&text), mode);
                if incomplete {
                    warn!("⚠️ {} response may be incomplete ({} chars)", mode, text.chars().count());
                }
                FieldState::Result {
                    title: mode.title().to_string(),
                    text,
                    incomplete,
                }
            }
            Err(e) => FieldState::Error(e.to_string()),
        };
        self.set_state(mode, outcome.clone());
        outcome
    }

    /// Ctrl+Shift+C clears and Ctrl+Enter submits the active mode.
    /// Returns whether the key was handled.
    pub async fn on_key_down(&self, event: &KeyEvent) -> bool {
        if event.is_panel_clear_shortcut() {
            self.clear(self.active_mode());
            true
        } else if event.is_panel_submit_shortcut() {
            self.analyze(self.active_mode()).await;
            true
        } else {
            false
        }
    }

    pub fn login_state(&self) -> LoginState {
        self.login.state()
    }

    pub fn log_in(&self, email: &str) {
        self.login.log_in(email);
    }

    pub fn logout(&self) {
        self.login.logout();
    }
}
