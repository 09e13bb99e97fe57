/// A keydown event as seen by a page or panel document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    /// Layout-independent key code, e.g. `Space`, `KeyC`, `Enter`.
    pub code: String,
    /// Produced character or named key, e.g. `C`, `Enter`.
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(code: &str, key: &str) -> Self {
        Self {
            code: code.to_string(),
            key: key.to_string(),
            ctrl: false,
            shift: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Ctrl+Shift+Space on a page: analyze the selection right away.
    pub fn is_page_analyze_shortcut(&self) -> bool {
        self.ctrl && self.shift && self.code == "Space"
    }

    /// Ctrl+Shift+C in the panel: clear the active input.
    pub fn is_panel_clear_shortcut(&self) -> bool {
        self.ctrl && self.shift && self.key == "C"
    }

    /// Ctrl+Enter in the panel: analyze the active tab.
    pub fn is_panel_submit_shortcut(&self) -> bool {
        self.ctrl && self.key == "Enter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts() {
        assert!(KeyEvent::new("Space", " ").with_ctrl().with_shift().is_page_analyze_shortcut());
        assert!(!KeyEvent::new("Space", " ").with_ctrl().is_page_analyze_shortcut());
        assert!(KeyEvent::new("KeyC", "C").with_ctrl().with_shift().is_panel_clear_shortcut());
        assert!(KeyEvent::new("Enter", "Enter").with_ctrl().is_panel_submit_shortcut());
        assert!(!KeyEvent::new("Enter", "Enter").is_panel_submit_shortcut());
    }
}
