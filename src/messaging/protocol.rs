use serde::{Deserialize, Serialize};

/// Requests exchanged between page, background and panel, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetSelectedText,
    GetEditorCode,
    GetLeetCodeContext,
    #[serde(rename_all = "camelCase")]
    AnalyzeCode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        editor_code: Option<String>,
    },
    OpenPopup,
}

impl Request {
    pub fn analyze_selection(selected_text: impl Into<String>) -> Self {
        Request::AnalyzeCode {
            selected_text: Some(selected_text.into()),
            editor_code: None,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Request::GetSelectedText => "getSelectedText",
            Request::GetEditorCode => "getEditorCode",
            Request::GetLeetCodeContext => "getLeetCodeContext",
            Request::AnalyzeCode { .. } => "analyzeCode",
            Request::OpenPopup => "openPopup",
        }
    }
}

/// Replies. Untagged on the wire, matching the shape each request expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    Context {
        selected_text: String,
        editor_code: String,
    },
    #[serde(rename_all = "camelCase")]
    SelectedText { selected_text: String },
    #[serde(rename_all = "camelCase")]
    EditorCode { editor_code: String },
    Ack { success: bool },
}

impl Response {
    pub fn ack() -> Self {
        Response::Ack { success: true }
    }

    pub fn selected_text(&self) -> Option<&str> {
        match self {
            Response::Context { selected_text, .. } | Response::SelectedText { selected_text } => {
                Some(selected_text)
            }
            _ => None,
        }
    }

    pub fn editor_code(&self) -> Option<&str> {
        match self {
            Response::Context { editor_code, .. } | Response::EditorCode { editor_code } => {
                Some(editor_code)
            }
            _ => None,
        }
    }
}

pub const SIDEBAR_SOURCE: &str = "code-analyzer-iframe";

/// `postMessage` traffic between an embedding page and the sidebar iframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FrameMessage {
    /// Page to sidebar: new text was selected.
    Selection {
        #[serde(default)]
        text: String,
    },
    /// Sidebar to parent: please expand the iframe.
    Expand { source: String },
    /// Sidebar to parent: please collapse the iframe.
    Collapse { source: String },
}

impl FrameMessage {
    pub fn expand() -> Self {
        FrameMessage::Expand { source: SIDEBAR_SOURCE.to_string() }
    }

    pub fn collapse() -> Self {
        FrameMessage::Collapse { source: SIDEBAR_SOURCE.to_string() }
    }
}
