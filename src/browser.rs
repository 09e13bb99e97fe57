use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::content::ContentScript;
use crate::extractor::{FrameExtraction, PageError, PageExtractor, PageSnapshot};
use crate::messaging::{
    Delivery, ExtensionRuntime, MessageSender, Port, Request, Response, Unavailable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Context in which a context-menu item is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuContext {
    Selection,
    Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMenuItem {
    pub id: String,
    pub title: String,
    pub contexts: Vec<MenuContext>,
}

/// Host-side notifications a driver can react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    PanelOpened,
    ContentScriptInjected(TabId),
}

/// What the extension needs from the browser.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Active tab of the focused window.
    async fn active_tab(&self) -> Result<TabInfo>;

    /// Runs the extractor in every frame of `tab`, top frame first. A frame
    /// that refuses scripts yields an `Err` entry instead of failing the call.
    async fn execute_in_all_frames(
        &self,
        tab: TabId,
        extractor: &PageExtractor,
    ) -> Result<Vec<Result<FrameExtraction, PageError>>>;

    /// Sends to the content script of `tab` and waits for its reply.
    async fn send_tab_message(&self, tab: TabId, request: Request) -> Delivery<Response>;

    async fn inject_content_script(&self, tab: TabId) -> Result<()>;

    /// Opens the panel. Returns `false` when it was already open.
    async fn open_panel(&self) -> Result<bool>;

    fn create_context_menu(&self, item: ContextMenuItem) -> Result<()>;
}

pub type SharedPage = Arc<RwLock<PageSnapshot>>;

const RESTRICTED_SCHEMES: &[&str] = &["chrome", "chrome-extension", "edge", "about", "devtools", "view-source"];

/// Pages where extensions may not run scripts.
pub fn is_restricted_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => RESTRICTED_SCHEMES.contains(&parsed.scheme()),
        Err(_) => true,
    }
}

struct InjectedScript {
    script: Arc<ContentScript>,
    port: Port,
    _task: JoinHandle<()>,
}

struct LocalTab {
    id: TabId,
    url: String,
    frames: Vec<SharedPage>,
    content: Option<InjectedScript>,
}

/// Headless in-process browser: tabs of page snapshots, content-script
/// injection, context menus and a single panel.
pub struct LocalBrowser {
    tabs: Mutex<Vec<LocalTab>>,
    active: Mutex<Option<TabId>>,
    next_id: AtomicU32,
    runtime: Mutex<Option<Arc<ExtensionRuntime>>>,
    menus: Mutex<Vec<ContextMenuItem>>,
    panel_open: AtomicBool,
    events: broadcast::Sender<BrowserEvent>,
}

impl Default for LocalBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBrowser {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            tabs: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            next_id: AtomicU32::new(1),
            runtime: Mutex::new(None),
            menus: Mutex::new(Vec::new()),
            panel_open: AtomicBool::new(false),
            events,
        }
    }

    /// Installs the extension whose content scripts this browser injects.
    pub fn attach_runtime(&self, runtime: Arc<ExtensionRuntime>) {
        *self.runtime.lock() = Some(runtime);
    }

    /// Opens and activates a tab. The first frame is the top frame.
    pub fn open_tab(&self, frames: Vec<PageSnapshot>) -> Result<TabId> {
        let top = frames.first().ok_or_else(|| anyhow!("A tab needs at least a top frame"))?;
        let id = TabId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let tab = LocalTab {
            id,
            url: top.url.clone(),
            frames: frames.into_iter().map(|f| Arc::new(RwLock::new(f))).collect(),
            content: None,
        };
        info!("🗂️ Opened tab {} ({})", id, tab.url);
        self.tabs.lock().push(tab);
        *self.active.lock() = Some(id);
        Ok(id)
    }

    pub fn activate(&self, tab: TabId) -> Result<()> {
        if !self.tabs.lock().iter().any(|t| t.id == tab) {
            return Err(anyhow!("No tab with id: {}", tab));
        }
        *self.active.lock() = Some(tab);
        Ok(())
    }

    pub fn frame(&self, tab: TabId, index: usize) -> Option<SharedPage> {
        self.tabs
            .lock()
            .iter()
            .find(|t| t.id == tab)
            .and_then(|t| t.frames.get(index).cloned())
    }

    pub fn content_script(&self, tab: TabId) -> Option<Arc<ContentScript>> {
        self.tabs
            .lock()
            .iter()
            .find(|t| t.id == tab)
            .and_then(|t| t.content.as_ref().map(|c| c.script.clone()))
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open.load(Ordering::SeqCst)
    }

    pub fn close_panel(&self) {
        self.panel_open.store(false, Ordering::SeqCst);
    }

    pub fn context_menus(&self) -> Vec<ContextMenuItem> {
        self.menus.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrowserEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: BrowserEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Browser for LocalBrowser {
    async fn active_tab(&self) -> Result<TabInfo> {
        let active = (*self.active.lock()).ok_or_else(|| anyhow!("No active tab"))?;
        let tabs = self.tabs.lock();
        let tab = tabs
            .iter()
            .find(|t| t.id == active)
            .ok_or_else(|| anyhow!("Active tab {} is gone", active))?;
        Ok(TabInfo {
            id: tab.id,
            url: Some(tab.url.clone()),
        })
    }

    async fn execute_in_all_frames(
        &self,
        tab: TabId,
        extractor: &PageExtractor,
    ) -> Result<Vec<Result<FrameExtraction, PageError>>> {
        let frames = {
            let tabs = self.tabs.lock();
            let tab = tabs
                .iter()
                .find(|t| t.id == tab)
                .ok_or_else(|| anyhow!("No tab with id: {}", tab))?;
            if is_restricted_url(&tab.url) {
                return Err(anyhow!("Cannot access contents of url \"{}\"", tab.url));
            }
            tab.frames.clone()
        };

        Ok(frames
            .iter()
            .map(|frame| {
                let page = frame.read();
                if page.script_blocked {
                    Err(PageError::ScriptBlocked(page.url.clone()))
                } else {
                    Ok(extractor.extract(&*page))
                }
            })
            .collect())
    }

    async fn send_tab_message(&self, tab: TabId, request: Request) -> Delivery<Response> {
        let port = {
            let tabs = self.tabs.lock();
            match tabs.iter().find(|t| t.id == tab).and_then(|t| t.content.as_ref()) {
                Some(content) => content.port.clone(),
                None => return Delivery::Unavailable(Unavailable::NoReceiver),
            }
        };
        port.request(request, MessageSender::extension()).await
    }

    async fn inject_content_script(&self, tab: TabId) -> Result<()> {
        let runtime = self
            .runtime
            .lock()
            .clone()
            .ok_or_else(|| anyhow!("No extension installed"))?;

        let mut tabs = self.tabs.lock();
        let local = tabs
            .iter_mut()
            .find(|t| t.id == tab)
            .ok_or_else(|| anyhow!("No tab with id: {}", tab))?;
        if is_restricted_url(&local.url) {
            return Err(anyhow!("Cannot access contents of url \"{}\"", local.url));
        }
        let top = local
            .frames
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Tab {} has no frames", tab))?;

        let script = Arc::new(ContentScript::new(tab, top, runtime.handle(MessageSender::tab(tab))));
        let (port, task) = script.clone().start();
        // Replacing the previous script drops its port, which ends its listener.
        local.content = Some(InjectedScript { script, port, _task: task });
        drop(tabs);

        debug!("Injected content script into tab {}", tab);
        self.emit(BrowserEvent::ContentScriptInjected(tab));
        Ok(())
    }

    async fn open_panel(&self) -> Result<bool> {
        if self.panel_open.swap(true, Ordering::SeqCst) {
            debug!("Panel already open");
            return Ok(false);
        }
        info!("🪟 Opening analysis panel");
        self.emit(BrowserEvent::PanelOpened);
        Ok(true)
    }

    fn create_context_menu(&self, item: ContextMenuItem) -> Result<()> {
        let mut menus = self.menus.lock();
        if menus.iter().any(|m| m.id == item.id) {
            return Err(anyhow!("Cannot create item with duplicate id {}", item.id));
        }
        menus.push(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted_urls() {
        assert!(is_restricted_url("chrome://extensions"));
        assert!(is_restricted_url("about:blank"));
        assert!(is_restricted_url("not a url"));
        assert!(!is_restricted_url("https://leetcode.com/problems/two-sum/"));
    }

    #[tokio::test]
    async fn test_frames_in_order_with_blocked_frame() {
        let browser = LocalBrowser::new();
        let tab = browser
            .open_tab(vec![
                PageSnapshot::new("https://a").with_selection("top"),
                PageSnapshot::new("https://ads").script_blocked(),
                PageSnapshot::new("https://b").with_code_mirror("x = 1"),
            ])
            .unwrap();

        let results = browser
            .execute_in_all_frames(tab, &PageExtractor::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().selected, "top");
        assert!(matches!(results[1], Err(PageError::ScriptBlocked(_))));
        assert_eq!(results[2].as_ref().unwrap().code, "x = 1");
    }

    #[tokio::test]
    async fn test_panel_open_is_idempotent() {
        let browser = LocalBrowser::new();
        let mut events = browser.subscribe();
        assert!(browser.open_panel().await.unwrap());
        assert!(!browser.open_panel().await.unwrap());
        assert_eq!(events.recv().await.unwrap(), BrowserEvent::PanelOpened);
        assert!(events.try_recv().is_err());

        browser.close_panel();
        assert!(browser.open_panel().await.unwrap());
    }

    #[tokio::test]
    async fn test_message_without_content_script() {
        let browser = LocalBrowser::new();
        let tab = browser.open_tab(vec![PageSnapshot::new("https://a")]).unwrap();
        assert_eq!(
            browser.send_tab_message(tab, Request::GetLeetCodeContext).await,
            Delivery::Unavailable(Unavailable::NoReceiver)
        );
    }

    #[test]
    fn test_duplicate_context_menu() {
        let browser = LocalBrowser::new();
        let item = ContextMenuItem {
            id: "analyzeCode".into(),
            title: "🤖 Analyze Code".into(),
            contexts: vec![MenuContext::Selection],
        };
        browser.create_context_menu(item.clone()).unwrap();
        assert!(browser.create_context_menu(item).is_err());
    }
}
