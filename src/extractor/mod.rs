pub mod page;
pub mod readers;

pub use page::{CodeBlock, PageApi, PageContext, PageError, PageSnapshot, TextArea};
pub use readers::{default_readers, CodeMirrorReader, EditorReader, MonacoReader, TextAreaReader};

use log::debug;
use serde::{Deserialize, Serialize};

/// What one frame reported during a capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameExtraction {
    pub selected: String,
    pub code: String,
}

/// Best-effort reader of the selection and editor contents of a page.
pub struct PageExtractor {
    readers: Vec<Box<dyn EditorReader>>,
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new(default_readers())
    }
}

impl PageExtractor {
    pub fn new(readers: Vec<Box<dyn EditorReader>>) -> Self {
        Self { readers }
    }

    pub fn reader_names(&self) -> Vec<&'static str> {
        self.readers.iter().map(|p| p.name()).collect()
    }

    /// Trimmed selection, or an empty string when there is none or the API fails.
    pub fn selected_text(&self, page: &dyn PageContext) -> String {
        match page.selection() {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => String::new(),
            Err(e) => {
                debug!("Selection lookup failed: {}", e);
                String::new()
            }
        }
    }

    /// Runs the readers in priority order; the first non-blank value wins.
    pub fn editor_code(&self, page: &dyn PageContext) -> String {
        for reader in &self.readers {
            match reader.try_extract(page) {
                Ok(Some(code)) => {
                    debug!("Editor code found by {} reader ({} chars)", reader.name(), code.len());
                    return code;
                }
                Ok(None) => {}
                Err(e) => debug!("{} reader failed: {}", reader.name(), e),
            }
        }
        String::new()
    }

    pub fn extract(&self, page: &dyn PageContext) -> FrameExtraction {
        FrameExtraction {
            selected: self.selected_text(page),
            code: self.editor_code(page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_is_trimmed() {
        let page = PageSnapshot::new("https://a").with_selection("  two sum  \n");
        assert_eq!(PageExtractor::default().selected_text(&page), "two sum");
    }

    #[test]
    fn test_selection_failure_is_empty() {
        let page = PageSnapshot::new("https://a")
            .with_selection("hidden")
            .with_fault(PageApi::Selection);
        assert_eq!(PageExtractor::default().selected_text(&page), "");
    }

    #[test]
    fn test_reader_priority() {
        let page = PageSnapshot::new("https://a")
            .with_monaco(vec!["monaco code"])
            .with_code_mirror("cm code")
            .with_text_area(None, "ta code");
        assert_eq!(PageExtractor::default().editor_code(&page), "monaco code");
    }

    #[test]
    fn test_failing_reader_does_not_block_next() {
        let page = PageSnapshot::new("https://a")
            .with_monaco(vec!["monaco code"])
            .with_fault(PageApi::Monaco)
            .with_code_mirror("   ")
            .with_text_area(Some("Code editor"), "class Solution {}");
        assert_eq!(PageExtractor::default().editor_code(&page), "class Solution {}");
    }

    #[test]
    fn test_all_readers_failing_is_empty() {
        let page = PageSnapshot::new("https://a")
            .with_fault(PageApi::Monaco)
            .with_fault(PageApi::CodeMirror)
            .with_fault(PageApi::TextAreas);
        let extraction = PageExtractor::default().extract(&page);
        assert_eq!(extraction, FrameExtraction::default());
    }

    #[test]
    fn test_reader_names_in_order() {
        assert_eq!(
            PageExtractor::default().reader_names(),
            vec!["monaco", "codemirror", "textarea"]
        );
    }
}
