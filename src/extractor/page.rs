use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page APIs an extraction step may call into. Any of them can throw on a real page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageApi {
    Selection,
    Monaco,
    CodeMirror,
    TextAreas,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("{0:?} API failed: {1}")]
    ApiFailed(PageApi, String),
    #[error("Scripts cannot run in frame {0}")]
    ScriptBlocked(String),
}

/// A `<textarea>` on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextArea {
    pub aria_label: Option<String>,
    pub value: String,
}

impl TextArea {
    pub fn is_code_editor(&self) -> bool {
        self.aria_label.as_deref() == Some("Code editor")
    }
}

/// A code-block-like element that can carry an "Analyze" button.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeBlock {
    pub id: String,
    pub tag: String,
    pub classes: Vec<String>,
    /// Whether the element has a parent (or enclosing `<pre>`) to host a button.
    pub has_parent: bool,
    pub text: String,
}

impl CodeBlock {
    /// Matches `pre code, code, .highlight, .code-block`.
    pub fn is_code_like(&self) -> bool {
        self.tag.eq_ignore_ascii_case("code")
            || self
                .classes
                .iter()
                .any(|c| c == "highlight" || c == "code-block")
    }
}

/// Read access to one document (top frame or iframe).
pub trait PageContext: Send + Sync {
    /// Current selection text, `None` when the selection has no range.
    fn selection(&self) -> Result<Option<String>, PageError>;

    /// Values of the loaded models of a Monaco-style editor, `None` when the
    /// framework is not present on the page.
    fn monaco_models(&self) -> Result<Option<Vec<String>>, PageError>;

    /// Value of the first CodeMirror-style widget, `None` when there is none.
    fn code_mirror_value(&self) -> Result<Option<String>, PageError>;

    fn text_areas(&self) -> Result<Vec<TextArea>, PageError>;

    fn code_blocks(&self) -> Vec<CodeBlock>;
}

/// Serializable description of a document, used by the headless browser host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub url: String,
    pub selection: Option<String>,
    pub monaco_models: Option<Vec<String>>,
    pub code_mirror: Option<String>,
    pub text_areas: Vec<TextArea>,
    pub code_blocks: Vec<CodeBlock>,
    /// APIs that throw when called on this page.
    pub faults: Vec<PageApi>,
    /// Sandboxed or cross-origin frame where injected scripts fail.
    pub script_blocked: bool,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_selection(mut self, text: impl Into<String>) -> Self {
        self.selection = Some(text.into());
        self
    }

    pub fn with_monaco(mut self, models: Vec<&str>) -> Self {
        self.monaco_models = Some(models.into_iter().map(String::from).collect());
        self
    }

    pub fn with_code_mirror(mut self, value: impl Into<String>) -> Self {
        self.code_mirror = Some(value.into());
        self
    }

    pub fn with_text_area(mut self, aria_label: Option<&str>, value: impl Into<String>) -> Self {
        self.text_areas.push(TextArea {
            aria_label: aria_label.map(String::from),
            value: value.into(),
        });
        self
    }

    pub fn with_code_block(mut self, block: CodeBlock) -> Self {
        self.code_blocks.push(block);
        self
    }

    pub fn with_fault(mut self, api: PageApi) -> Self {
        self.faults.push(api);
        self
    }

    pub fn script_blocked(mut self) -> Self {
        self.script_blocked = true;
        self
    }

    fn check(&self, api: PageApi) -> Result<(), PageError> {
        if self.faults.contains(&api) {
            return Err(PageError::ApiFailed(api, format!("{} threw", self.url)));
        }
        Ok(())
    }
}

impl PageContext for PageSnapshot {
    fn selection(&self) -> Result<Option<String>, PageError> {
        self.check(PageApi::Selection)?;
        Ok(self.selection.clone())
    }

    fn monaco_models(&self) -> Result<Option<Vec<String>>, PageError> {
        self.check(PageApi::Monaco)?;
        Ok(self.monaco_models.clone())
    }

    fn code_mirror_value(&self) -> Result<Option<String>, PageError> {
        self.check(PageApi::CodeMirror)?;
        Ok(self.code_mirror.clone())
    }

    fn text_areas(&self) -> Result<Vec<TextArea>, PageError> {
        self.check(PageApi::TextAreas)?;
        Ok(self.text_areas.clone())
    }

    fn code_blocks(&self) -> Vec<CodeBlock> {
        self.code_blocks.clone()
    }
}
