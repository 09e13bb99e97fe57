use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::analysis::{AnalysisClient, AnalysisError, SidebarRequest, SidebarTab};
use crate::handoff::now_ms;
use crate::messaging::FrameMessage;
use crate::storage::{
    EphemeralStorage, StorageArea, StorageChange, LAST_ANALYSIS_KEY, SELECTED_AT_KEY,
    SELECTED_TEXT_KEY,
};

pub const PREVIEW_CHARS: usize = 500;
pub const IDLE_STATUS: &str = "Idle";

const NO_INPUT_STATUS_MS: u64 = 1_800;
const DONE_STATUS_MS: u64 = 2_000;
const ERROR_STATUS_MS: u64 = 5_000;

/// Selection preview used by the auto-filled hints panel.
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", head)
    } else {
        text.to_string()
    }
}

struct Status {
    text: String,
    set_at: Instant,
    hide_after: Option<Duration>,
}

struct SidebarState {
    input: String,
    panels: HashMap<SidebarTab, String>,
    active: SidebarTab,
    collapsed: bool,
    loading: bool,
    status: Status,
}

/// In-page sidebar frame. Talks to its parent page only through
/// [`FrameMessage`]s and to the rest of the extension through storage.
pub struct Sidebar {
    storage: Arc<dyn EphemeralStorage>,
    client: AnalysisClient,
    parent: mpsc::UnboundedSender<FrameMessage>,
    state: Mutex<SidebarState>,
}

impl Sidebar {
    pub fn new(
        storage: Arc<dyn EphemeralStorage>,
        client: AnalysisClient,
        parent: mpsc::UnboundedSender<FrameMessage>,
    ) -> Self {
        Self {
            storage,
            client,
            parent,
            state: Mutex::new(SidebarState {
                input: String::new(),
                panels: HashMap::new(),
                active: SidebarTab::Hints,
                collapsed: false,
                loading: false,
                status: Status {
                    text: IDLE_STATUS.to_string(),
                    set_at: Instant::now(),
                    hide_after: None,
                },
            }),
        }
    }

    /// Picks up a selection stored before the sidebar was loaded.
    pub fn load(&self) {
        if let Some(text) = self.storage.get_string(SELECTED_TEXT_KEY).filter(|t| !t.is_empty()) {
            self.show_selection(&text);
        }
    }

    /// Follows `selectedText` changes until the storage goes away.
    pub fn watch_storage(self: Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => self.on_storage_change(&change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Sidebar missed {} storage changes", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn on_storage_change(&self, change: &StorageChange) {
        if change.area != StorageArea::Local || change.key != SELECTED_TEXT_KEY {
            return;
        }
        let text = change
            .new_value
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.show_selection(text);
    }

    pub fn on_window_message(&self, message: &FrameMessage) {
        let text = match message {
            FrameMessage::Selection { text } => text,
            _ => return,
        };
        self.show_selection(text);
        self.post_to_parent(FrameMessage::expand());

        let mut items = Map::new();
        items.insert(SELECTED_TEXT_KEY.to_string(), json!(text));
        items.insert(SELECTED_AT_KEY.to_string(), json!(now_ms()));
        self.storage.set_items(items);
    }

    fn show_selection(&self, text: &str) {
        let mut state = self.state.lock();
        state.input = text.to_string();
        state.panels = auto_filled_panels(text);
    }

    fn post_to_parent(&self, message: FrameMessage) {
        if self.parent.send(message).is_err() {
            debug!("Parent page is gone, frame message dropped");
        }
    }

    /// Returns the new collapsed state.
    pub fn toggle_collapse(&self) -> bool {
        let collapsed = {
            let mut state = self.state.lock();
            state.collapsed = !state.collapsed;
            state.collapsed
        };
        self.post_to_parent(if collapsed {
            FrameMessage::collapse()
        } else {
            FrameMessage::expand()
        });
        collapsed
    }

    pub fn clear(&self) {
        self.show_selection("");
        self.storage.set(SELECTED_TEXT_KEY, json!(""));
    }

    pub fn clear_result(&self, tab: SidebarTab) {
        self.state.lock().panels.insert(tab, String::new());
    }

    pub fn select_tab(&self, tab: SidebarTab) {
        self.state.lock().active = tab;
    }

    pub fn active_tab(&self) -> SidebarTab {
        self.state.lock().active
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.state.lock().input = text.into();
    }

    pub fn input(&self) -> String {
        self.state.lock().input.clone()
    }

    pub fn panel_text(&self, tab: SidebarTab) -> String {
        self.state.lock().panels.get(&tab).cloned().unwrap_or_default()
    }

    pub fn is_collapsed(&self) -> bool {
        self.state.lock().collapsed
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    fn set_status(&self, text: impl Into<String>, hide_after_ms: Option<u64>) {
        self.state.lock().status = Status {
            text: text.into(),
            set_at: Instant::now(),
            hide_after: hide_after_ms.map(Duration::from_millis),
        };
    }

    pub fn status_text(&self) -> String {
        self.status_text_at(Instant::now())
    }

    /// Status line as shown at `now`; timed messages fall back to "Idle".
    pub fn status_text_at(&self, now: Instant) -> String {
        let state = self.state.lock();
        match state.status.hide_after {
            Some(hide_after) if now.duration_since(state.status.set_at) >= hide_after => {
                IDLE_STATUS.to_string()
            }
            _ => state.status.text.clone(),
        }
    }

    /// Requests every panel at once and records the exchange as `lastAnalysis`.
    pub async fn analyze(&self) {
        let text = self.input().trim().to_string();
        if text.is_empty() {
            self.set_status("No input to analyze", Some(NO_INPUT_STATUS_MS));
            return;
        }

        self.state.lock().loading = true;
        self.set_status("Analyzing...", None);

        match self.client.analyze_tabs(&SidebarRequest::all_tabs(text.as_str())).await {
            Ok(analysis) => {
                {
                    let mut state = self.state.lock();
                    for tab in SidebarTab::ALL {
                        state.panels.insert(tab, analysis.text_for(tab));
                    }
                }
                self.storage.set(
                    LAST_ANALYSIS_KEY,
                    json!({ "at": now_ms(), "input": text, "result": analysis.raw() }),
                );
                info!("✅ Sidebar analysis complete");
                self.set_status("Done", Some(DONE_STATUS_MS));
            }
            Err(e) => {
                error!("❌ Sidebar analysis failed: {}", e);
                let message = match e {
                    AnalysisError::Http { status, body } => format!("Server error: {} {}", status, body),
                    other => other.to_string(),
                };
                self.set_status(format!("Error: {}", message), Some(ERROR_STATUS_MS));
            }
        }

        self.state.lock().loading = false;
    }
}

fn auto_filled_panels(text: &str) -> HashMap<SidebarTab, String> {
    let shown = preview(text);
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    SidebarTab::ALL
        .iter()
        .map(|tab| {
            (
                *tab,
                format!("Auto-loaded selection ({}): \n\n{}", now, tab.auto_fill(&shown)),
            )
        })
        .collect()
}
