use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod affordance;
pub mod analysis;
pub mod background;
pub mod browser;
pub mod config;
pub mod content;
pub mod extractor;
pub mod handoff;
pub mod keyboard;
pub mod login;
pub mod messaging;
pub mod panel;
pub mod sidebar;
pub mod storage;

use analysis::{AnalysisClient, AnalysisMode};
use background::{BackgroundCoordinator, MenuClick, ANALYZE_COMMAND, CONTEXT_MENU_ID};
use browser::{Browser, LocalBrowser, TabId, TabStatus};
use config::AssistantConfig;
use extractor::PageSnapshot;
use messaging::{ExtensionRuntime, FrameMessage, Port};
use panel::{AnalysisPanel, FieldState, Prefill};
use sidebar::Sidebar;
use storage::MemoryStorage;

/// An installed extension inside a [`LocalBrowser`]: shared storage, the
/// background listener and the runtime content scripts talk through.
pub struct Extension {
    pub config: AssistantConfig,
    pub browser: Arc<LocalBrowser>,
    pub local: Arc<MemoryStorage>,
    pub page: Arc<MemoryStorage>,
    pub runtime: Arc<ExtensionRuntime>,
    pub background: Arc<BackgroundCoordinator>,
    _background_task: JoinHandle<()>,
}

impl Extension {
    /// Installs the extension. Must be called from within a tokio runtime.
    pub fn install(config: AssistantConfig) -> Result<Self> {
        let browser = Arc::new(LocalBrowser::new());
        let local = Arc::new(MemoryStorage::local());
        let page = Arc::new(MemoryStorage::page());

        let background = Arc::new(BackgroundCoordinator::new(browser.clone(), local.clone(), &config));
        let (port, background_task) = Port::listen("background", background.clone());
        let runtime = Arc::new(ExtensionRuntime::new(port));
        browser.attach_runtime(runtime.clone());
        background.on_installed()?;

        info!("🚀 Code Assistant installed");
        Ok(Self {
            config,
            browser,
            local,
            page,
            runtime,
            background,
            _background_task: background_task,
        })
    }

    /// Opens a tab and lets it finish loading, which injects the content script.
    pub async fn open_page(&self, frames: Vec<PageSnapshot>) -> Result<TabId> {
        let tab = self.browser.open_tab(frames)?;
        let url = self.browser.active_tab().await?.url;
        self.background
            .on_tab_updated(tab, TabStatus::Complete, url.as_deref())
            .await;
        Ok(tab)
    }

    pub fn client(&self) -> AnalysisClient {
        AnalysisClient::new(&self.config)
    }

    pub fn open_panel_view(&self) -> AnalysisPanel {
        AnalysisPanel::new(
            self.browser.clone(),
            self.local.clone(),
            self.page.clone(),
            self.client(),
            &self.config,
        )
    }

    pub fn sidebar(&self, parent: mpsc::UnboundedSender<FrameMessage>) -> Sidebar {
        Sidebar::new(self.local.clone(), self.client(), parent)
    }
}

/// A page snapshot file: a single frame or a list of frames, top frame first.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Frames(Vec<PageSnapshot>),
    Single(PageSnapshot),
}

pub fn load_snapshot(path: &Path) -> Result<Vec<PageSnapshot>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page snapshot {}", path.display()))?;
    let frames = match serde_json::from_str(&raw)
        .with_context(|| format!("Invalid page snapshot {}", path.display()))?
    {
        SnapshotFile::Frames(frames) => frames,
        SnapshotFile::Single(frame) => vec![frame],
    };
    if frames.is_empty() {
        return Err(anyhow!("Page snapshot {} has no frames", path.display()));
    }
    Ok(frames)
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: Option<AnalysisMode>,
    pub email: Option<String>,
    /// Simulates the context-menu entry with this selection instead of the
    /// keyboard command.
    pub selection: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub prefill: Prefill,
    pub active_mode: AnalysisMode,
    pub input: String,
    pub outcome: Option<FieldState>,
}

/// One capture-to-analysis pass over the given frames.
pub async fn run(config: AssistantConfig, frames: Vec<PageSnapshot>, options: RunOptions) -> Result<RunReport> {
    config.log_status();
    let extension = Extension::install(config)?;
    let tab = extension.open_page(frames).await?;

    match options.selection {
        Some(selection) => {
            let click = MenuClick {
                menu_item_id: CONTEXT_MENU_ID.to_string(),
                selection_text: Some(selection),
            };
            extension.background.on_context_menu_clicked(&click, Some(tab)).await;
        }
        None => extension.background.on_command(ANALYZE_COMMAND).await,
    }

    if !extension.browser.is_panel_open() {
        return Err(anyhow!("The analysis panel did not open"));
    }

    let panel = extension.open_panel_view();
    if let Some(email) = options.email.as_deref() {
        panel.log_in(email);
    }
    let prefill = panel.load_captured().await;
    if prefill == Prefill::Nothing {
        warn!("⚠️ Nothing was captured from the page");
    }

    let outcome = match options.mode {
        Some(mode) => {
            panel.switch_tab(mode);
            Some(panel.analyze(mode).await)
        }
        None => None,
    };

    let active_mode = panel.active_mode();
    Ok(RunReport {
        prefill,
        active_mode,
        input: panel.input(active_mode),
        outcome,
    })
}
