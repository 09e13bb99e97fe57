use super::page::{PageContext, PageError};

/// One strategy for reading the full contents of an in-page code editor.
///
/// `Ok(None)` means the widget is absent or empty; an `Err` is a reader failure.
/// Either way the extractor moves on to the next reader.
pub trait EditorReader: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_extract(&self, page: &dyn PageContext) -> Result<Option<String>, PageError>;
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// First loaded model of a Monaco editor.
pub struct MonacoReader;

impl EditorReader for MonacoReader {
    fn name(&self) -> &'static str {
        "monaco"
    }

    fn try_extract(&self, page: &dyn PageContext) -> Result<Option<String>, PageError> {
        let models = match page.monaco_models()? {
            Some(models) => models,
            None => return Ok(None),
        };
        Ok(models.into_iter().next().and_then(non_blank))
    }
}

/// The first CodeMirror instance on the page.
pub struct CodeMirrorReader;

impl EditorReader for CodeMirrorReader {
    fn name(&self) -> &'static str {
        "codemirror"
    }

    fn try_extract(&self, page: &dyn PageContext) -> Result<Option<String>, PageError> {
        Ok(page.code_mirror_value()?.and_then(non_blank))
    }
}

/// A textarea labelled "Code editor", otherwise the first textarea on the page.
pub struct TextAreaReader;

impl EditorReader for TextAreaReader {
    fn name(&self) -> &'static str {
        "textarea"
    }

    fn try_extract(&self, page: &dyn PageContext) -> Result<Option<String>, PageError> {
        let areas = page.text_areas()?;
        let chosen = areas
            .iter()
            .find(|area| area.is_code_editor())
            .or_else(|| areas.first());
        Ok(chosen.and_then(|area| non_blank(area.value.clone())))
    }
}

/// Readers in priority order.
pub fn default_readers() -> Vec<Box<dyn EditorReader>> {
    vec![
        Box::new(MonacoReader),
        Box::new(CodeMirrorReader),
        Box::new(TextAreaReader),
    ]
}
