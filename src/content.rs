use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::affordance::{Affordances, MutationKind, INDICATOR_MIN_SELECTION_CHARS};
use crate::browser::{SharedPage, TabId};
use crate::extractor::PageExtractor;
use crate::keyboard::KeyEvent;
use crate::messaging::{
    Delivery, MessageHandler, MessageSender, Port, Request, Response, RuntimeHandle, Unavailable,
};

/// The script injected into a tab's top frame: answers context queries from the
/// extension and turns page gestures into `analyzeCode`/`openPopup` messages.
pub struct ContentScript {
    tab: TabId,
    page: SharedPage,
    extractor: PageExtractor,
    runtime: RuntimeHandle,
    affordances: Mutex<Affordances>,
}

impl ContentScript {
    pub fn new(tab: TabId, page: SharedPage, runtime: RuntimeHandle) -> Self {
        Self {
            tab,
            page,
            extractor: PageExtractor::default(),
            runtime,
            affordances: Mutex::new(Affordances::new()),
        }
    }

    /// Registers the message listener and does the initial code block scan.
    pub fn start(self: Arc<Self>) -> (Port, JoinHandle<()>) {
        let added = self.scan_code_blocks();
        debug!("Content script for tab {} started with {} analyze buttons", self.tab, added);
        let name = format!("content:{}", self.tab);
        Port::listen(name, self)
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn selected_text(&self) -> String {
        self.extractor.selected_text(&*self.page.read())
    }

    pub fn editor_code(&self) -> String {
        self.extractor.editor_code(&*self.page.read())
    }

    /// Shows the indicator for a long enough selection and asks the background
    /// to capture it. Returns whether the indicator was shown.
    pub fn on_mouse_up(&self, now: Instant) -> bool {
        let selected_text = self.selected_text();
        if selected_text.chars().count() <= INDICATOR_MIN_SELECTION_CHARS {
            return false;
        }

        self.affordances.lock().show_indicator(now);

        let request = Request::AnalyzeCode {
            selected_text: Some(selected_text),
            editor_code: Some(self.editor_code()),
        };
        if let Delivery::Unavailable(reason) = self.runtime.post_message(request) {
            debug!("analyzeCode from mouse-up not sent: {}", reason);
        }
        true
    }

    /// Handles the in-page Ctrl+Shift+Space shortcut. Returns whether a message was sent.
    pub fn on_key_down(&self, event: &KeyEvent) -> bool {
        if !event.is_page_analyze_shortcut() {
            return false;
        }
        let selected_text = self.selected_text();
        if selected_text.is_empty() {
            return false;
        }
        if !self.runtime.is_valid() {
            info!("Extension context invalidated, keyboard shortcut failed");
            return false;
        }
        self.runtime
            .post_message(Request::analyze_selection(selected_text))
            .is_delivered()
    }

    pub fn on_indicator_click(&self) -> Delivery<()> {
        if !self.runtime.is_valid() {
            self.affordances.lock().remove_indicator();
            return Delivery::Unavailable(Unavailable::ContextInvalidated);
        }
        let delivery = self.runtime.post_message(Request::OpenPopup);
        if !delivery.is_delivered() {
            self.affordances.lock().remove_indicator();
        }
        delivery
    }

    pub fn on_code_button_click(&self, block_id: &str) -> Delivery<()> {
        if !self.affordances.lock().has_button(block_id) {
            return Delivery::Unavailable(Unavailable::NoReceiver);
        }
        // The block's current text, not the text it had when the button was added.
        let current = self
            .page
            .read()
            .code_blocks
            .iter()
            .find(|b| b.id == block_id)
            .map(|b| b.text.clone());
        let code_text = match current {
            Some(text) => text,
            None => {
                debug!("Code block {} is gone, removing its button", block_id);
                self.affordances.lock().remove_button(block_id);
                return Delivery::Unavailable(Unavailable::NoReceiver);
            }
        };
        if !self.runtime.is_valid() {
            info!("Extension context invalidated, removing button");
            self.affordances.lock().remove_button(block_id);
            return Delivery::Unavailable(Unavailable::ContextInvalidated);
        }
        let delivery = self.runtime.post_message(Request::analyze_selection(code_text));
        if !delivery.is_delivered() {
            info!("Extension context invalidated, button click failed");
            self.affordances.lock().remove_button(block_id);
        }
        delivery
    }

    pub fn on_dom_mutations(&self, records: &[MutationKind]) -> usize {
        let blocks = self.page.read().code_blocks.clone();
        self.affordances.lock().on_mutations(records, &blocks)
    }

    pub fn scan_code_blocks(&self) -> usize {
        let blocks = self.page.read().code_blocks.clone();
        self.affordances.lock().register_code_blocks(&blocks)
    }

    pub fn indicator_visible(&self, now: Instant) -> bool {
        let mut affordances = self.affordances.lock();
        affordances.sweep(now);
        affordances.indicator_visible(now)
    }

    pub fn has_button(&self, block_id: &str) -> bool {
        self.affordances.lock().has_button(block_id)
    }
}

#[async_trait]
impl MessageHandler for ContentScript {
    async fn handle(&self, request: Request, _sender: MessageSender) -> Option<Response> {
        match request {
            Request::GetSelectedText => Some(Response::SelectedText {
                selected_text: self.selected_text(),
            }),
            Request::GetEditorCode => Some(Response::EditorCode {
                editor_code: self.editor_code(),
            }),
            Request::GetLeetCodeContext => Some(Response::Context {
                selected_text: self.selected_text(),
                editor_code: self.editor_code(),
            }),
            Request::AnalyzeCode { .. } | Request::OpenPopup => None,
        }
    }
}
