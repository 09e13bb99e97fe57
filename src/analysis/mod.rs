pub mod client;
pub mod completeness;

pub use client::AnalysisClient;
pub use completeness::is_response_incomplete;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Flavour of analysis requested from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Hints,
    Suggestions,
    Explanation,
    CleanCode,
    Solutions,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 5] = [
        AnalysisMode::Hints,
        AnalysisMode::Suggestions,
        AnalysisMode::Explanation,
        AnalysisMode::CleanCode,
        AnalysisMode::Solutions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Hints => "hints",
            AnalysisMode::Suggestions => "suggestions",
            AnalysisMode::Explanation => "explanation",
            AnalysisMode::CleanCode => "cleancode",
            AnalysisMode::Solutions => "solutions",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnalysisMode::Hints => "💡 Code Hints",
            AnalysisMode::Suggestions => "💭 Improvement Suggestions",
            AnalysisMode::Explanation => "📚 Code Explanation",
            AnalysisMode::CleanCode => "✨ Clean Code Suggestions",
            AnalysisMode::Solutions => "🎯 Solution Approaches",
        }
    }

    /// Instruction sent ahead of the user's text.
    pub fn instruction(&self) -> &'static str {
        match self {
            AnalysisMode::Hints => {
                "Provide concise hints for this code. Focus on key concepts and best practices only:"
            }
            AnalysisMode::Suggestions => "Provide different ways to solve this problem not code:",
            AnalysisMode::Explanation => "Explain this code briefly and clearly:",
            AnalysisMode::CleanCode => {
                "Provide clean, optimized code. Return only the refactored code without comments or explanations:"
            }
            AnalysisMode::Solutions => {
                "Provide a complete, working solution code. Return only the full working code without comments or explanations. Make sure the code is complete and functional:"
            }
        }
    }

    pub fn prompt(&self, code: &str) -> String {
        format!("{}\n\n{}", self.instruction(), code)
    }

    /// Responses shorter than this look cut off for the mode.
    pub fn min_response_chars(&self) -> usize {
        match self {
            AnalysisMode::Hints => 100,
            AnalysisMode::Suggestions => 150,
            AnalysisMode::Explanation => 200,
            AnalysisMode::CleanCode => 150,
            AnalysisMode::Solutions => 200,
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown analysis mode: {}", s))
    }
}

/// Body of a request to the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub question: String,
    pub mode: AnalysisMode,
    pub email: String,
}

impl AnalysisRequest {
    pub fn new(mode: AnalysisMode, code: &str, email: impl Into<String>) -> Self {
        Self {
            question: mode.prompt(code),
            mode,
            email: email.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("API request failed: {status} - {body}")]
    Http { status: u16, body: String },
    #[error("{0}")]
    Remote(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result panels of the sidebar, which are all filled by one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidebarTab {
    Hints,
    Suggestions,
    Explanation,
    Clean,
    Solutions,
    Errors,
}

impl SidebarTab {
    pub const ALL: [SidebarTab; 6] = [
        SidebarTab::Hints,
        SidebarTab::Suggestions,
        SidebarTab::Explanation,
        SidebarTab::Clean,
        SidebarTab::Solutions,
        SidebarTab::Errors,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SidebarTab::Hints => "hints",
            SidebarTab::Suggestions => "suggestions",
            SidebarTab::Explanation => "explanation",
            SidebarTab::Clean => "clean",
            SidebarTab::Solutions => "solutions",
            SidebarTab::Errors => "errors",
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            SidebarTab::Hints => "No hints returned.",
            SidebarTab::Suggestions => "No suggestions returned.",
            SidebarTab::Explanation => "No explanation returned.",
            SidebarTab::Clean => "No clean code returned.",
            SidebarTab::Solutions => "No solutions returned.",
            SidebarTab::Errors => "No error fixes returned.",
        }
    }

    /// Text shown while waiting for a real analysis of freshly loaded input.
    pub fn auto_fill(&self, preview: &str) -> String {
        match self {
            SidebarTab::Hints => preview.to_string(),
            SidebarTab::Suggestions => "Try to optimize loops, variable names...".to_string(),
            SidebarTab::Explanation => "Step-by-step explanation placeholder.".to_string(),
            SidebarTab::Clean => "Clean code suggestion placeholder.".to_string(),
            SidebarTab::Solutions => "Potential solutions placeholder.".to_string(),
            SidebarTab::Errors => "No obvious runtime errors detected.".to_string(),
        }
    }
}

/// Body of a request to the sidebar endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarRequest {
    pub text: String,
    pub tabs: Vec<String>,
}

impl SidebarRequest {
    pub fn all_tabs(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tabs: SidebarTab::ALL.iter().map(|t| t.key().to_string()).collect(),
        }
    }
}

/// Decoded sidebar response. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SidebarAnalysis {
    raw: Value,
}

impl SidebarAnalysis {
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.raw
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Text for a panel, falling back to its "No X returned." placeholder.
    pub fn text_for(&self, tab: SidebarTab) -> String {
        let value = match tab {
            SidebarTab::Hints => self.field("hints").or_else(|| self.field("hint")),
            other => self.field(other.key()),
        };
        value.unwrap_or_else(|| tab.placeholder()).to_string()
    }
}
