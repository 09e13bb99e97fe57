use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::browser::{Browser, ContextMenuItem, MenuContext, TabId, TabStatus};
use crate::config::AssistantConfig;
use crate::extractor::{FrameExtraction, PageError, PageExtractor};
use crate::handoff::{CapturedPayload, HandoffSlot};
use crate::messaging::{Delivery, MessageHandler, MessageSender, Request, Response};
use crate::storage::EphemeralStorage;

pub const CONTEXT_MENU_ID: &str = "analyzeCode";
pub const CONTEXT_MENU_TITLE: &str = "🤖 Analyze Code";
pub const ANALYZE_COMMAND: &str = "analyze-code";

/// A click on one of the extension's context-menu items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClick {
    pub menu_item_id: String,
    pub selection_text: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Picks the first qualifying selection and the first non-empty editor code,
/// in frame order. Values already known are kept. Failed frames are skipped.
///
/// Selection and code may come from different frames.
pub fn merge_frames(
    results: &[Result<FrameExtraction, PageError>],
    min_selection_chars: usize,
    mut selected_text: Option<String>,
    mut editor_code: Option<String>,
) -> (Option<String>, Option<String>) {
    for frame in results.iter().filter_map(|r| r.as_ref().ok()) {
        if selected_text.is_none() {
            let selected = frame.selected.trim();
            if selected.chars().count() > min_selection_chars {
                selected_text = Some(selected.to_string());
            }
        }
        if editor_code.is_none() {
            let code = frame.code.trim();
            if !code.is_empty() {
                editor_code = Some(code.to_string());
            }
        }
    }
    (selected_text, editor_code)
}

/// Background service: every capture trigger ends up in `handle_analyze_code`.
#[derive(Clone)]
pub struct BackgroundCoordinator {
    browser: Arc<dyn Browser>,
    handoff: HandoffSlot,
    extractor: Arc<PageExtractor>,
    min_selection_chars: usize,
}

impl BackgroundCoordinator {
    pub fn new(
        browser: Arc<dyn Browser>,
        storage: Arc<dyn EphemeralStorage>,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            browser,
            handoff: HandoffSlot::new(storage),
            extractor: Arc::new(PageExtractor::default()),
            min_selection_chars: config.min_selection_chars,
        }
    }

    /// Registers the selection context-menu entry.
    pub fn on_installed(&self) -> Result<()> {
        self.browser.create_context_menu(ContextMenuItem {
            id: CONTEXT_MENU_ID.to_string(),
            title: CONTEXT_MENU_TITLE.to_string(),
            contexts: vec![MenuContext::Selection],
        })?;
        info!("📋 Context menu registered");
        Ok(())
    }

    pub async fn on_context_menu_clicked(&self, click: &MenuClick, tab: Option<TabId>) {
        if click.menu_item_id == CONTEXT_MENU_ID {
            self.handle_analyze_code(tab, click.selection_text.clone(), None).await;
        }
    }

    pub async fn on_command(&self, command: &str) {
        if command == ANALYZE_COMMAND {
            self.handle_analyze_code(None, None, None).await;
        } else {
            debug!("Ignoring unknown command: {}", command);
        }
    }

    /// Re-injects the content script once a page finishes loading.
    pub async fn on_tab_updated(&self, tab: TabId, status: TabStatus, url: Option<&str>) {
        if status != TabStatus::Complete || url.is_none() {
            return;
        }
        if let Err(e) = self.browser.inject_content_script(tab).await {
            debug!("Content script injection skipped for tab {}: {}", tab, e);
        }
    }

    /// Captures text from `tab` (or the active tab), stores it for the panel and
    /// opens the panel. Never fails; errors are logged. Returns what was stored.
    pub async fn handle_analyze_code(
        &self,
        tab: Option<TabId>,
        selected_text: Option<String>,
        editor_code: Option<String>,
    ) -> Option<CapturedPayload> {
        match self.capture_and_open(tab, selected_text, editor_code).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Error handling analyze code: {}", e);
                None
            }
        }
    }

    async fn capture_and_open(
        &self,
        tab: Option<TabId>,
        selected_text: Option<String>,
        editor_code: Option<String>,
    ) -> Result<Option<CapturedPayload>> {
        let tab = match tab {
            Some(tab) => tab,
            None => self.browser.active_tab().await?.id,
        };
        let mut selected_text = non_empty(selected_text);
        let mut editor_code = non_empty(editor_code);

        match self.browser.execute_in_all_frames(tab, &self.extractor).await {
            Ok(results) => {
                let failed = results.iter().filter(|r| r.is_err()).count();
                if failed > 0 {
                    debug!("{} of {} frames could not be read", failed, results.len());
                }
                (selected_text, editor_code) =
                    merge_frames(&results, self.min_selection_chars, selected_text, editor_code);
            }
            Err(e) => info!("executeScript context fetch failed: {}", e),
        }

        if selected_text.is_none() || editor_code.is_none() {
            match self.browser.send_tab_message(tab, Request::GetLeetCodeContext).await {
                Delivery::Delivered(response) => {
                    selected_text =
                        selected_text.or_else(|| non_empty(response.selected_text().map(String::from)));
                    editor_code =
                        editor_code.or_else(|| non_empty(response.editor_code().map(String::from)));
                }
                Delivery::Unavailable(reason) => debug!("Content script fallback unavailable: {}", reason),
            }
        }

        let stored = if selected_text.is_some() || editor_code.is_some() {
            let payload = CapturedPayload::new(
                selected_text.unwrap_or_default(),
                editor_code.unwrap_or_default(),
            );
            self.handoff.put(&payload);
            Some(payload)
        } else {
            warn!("Nothing captured from tab {}", tab);
            None
        };

        self.browser.open_panel().await?;
        Ok(stored)
    }
}

#[async_trait]
impl MessageHandler for BackgroundCoordinator {
    async fn handle(&self, request: Request, sender: MessageSender) -> Option<Response> {
        match request {
            Request::AnalyzeCode {
                selected_text,
                editor_code,
            } => {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    coordinator
                        .handle_analyze_code(sender.tab, selected_text, editor_code)
                        .await;
                });
                Some(Response::ack())
            }
            Request::OpenPopup => {
                if let Err(e) = self.browser.open_panel().await {
                    error!("Failed to open panel: {}", e);
                }
                Some(Response::ack())
            }
            Request::GetSelectedText | Request::GetEditorCode | Request::GetLeetCodeContext => None,
        }
    }
}
