use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::debug;

use crate::extractor::CodeBlock;

pub const INDICATOR_LABEL: &str = "🤖 Right-click to analyze code";
pub const BUTTON_LABEL: &str = "🤖 Analyze";

/// Selections this long or shorter do not get the floating indicator.
pub const INDICATOR_MIN_SELECTION_CHARS: usize = 10;
const INDICATOR_VISIBLE: Duration = Duration::from_millis(1500);
const INDICATOR_SLIDE_OUT: Duration = Duration::from_millis(300);

/// Kind of a DOM mutation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// Page-side UI sugar: the floating selection indicator and the per-block
/// "Analyze" buttons. Nothing here affects what gets captured.
#[derive(Debug, Default)]
pub struct Affordances {
    indicator_shown_at: Option<Instant>,
    /// Blocks already processed, whether or not their button still exists.
    marked_blocks: HashSet<String>,
    /// Block ids that currently carry a button.
    buttons: HashSet<String>,
}

impl Affordances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows the indicator, replacing any previous one.
    pub fn show_indicator(&mut self, now: Instant) {
        self.indicator_shown_at = Some(now);
    }

    pub fn remove_indicator(&mut self) {
        self.indicator_shown_at = None;
    }

    pub fn indicator_visible(&self, now: Instant) -> bool {
        match self.indicator_shown_at {
            Some(shown_at) => now.duration_since(shown_at) < INDICATOR_VISIBLE + INDICATOR_SLIDE_OUT,
            None => false,
        }
    }

    /// Drops the indicator once its display time and slide-out have elapsed.
    pub fn sweep(&mut self, now: Instant) {
        if self.indicator_shown_at.is_some() && !self.indicator_visible(now) {
            self.indicator_shown_at = None;
        }
    }

    /// Adds a button to each code-like block not seen before. Returns how many were added.
    pub fn register_code_blocks(&mut self, blocks: &[CodeBlock]) -> usize {
        let mut added = 0;
        for block in blocks {
            if !block.is_code_like() || !block.has_parent || self.marked_blocks.contains(&block.id) {
                continue;
            }
            self.marked_blocks.insert(block.id.clone());
            self.buttons.insert(block.id.clone());
            added += 1;
        }
        if added > 0 {
            debug!("Added {} analyze buttons", added);
        }
        added
    }

    /// Rescans only when the batch contains a structural (child list) change.
    pub fn on_mutations(&mut self, records: &[MutationKind], blocks: &[CodeBlock]) -> usize {
        if records.iter().any(|kind| *kind == MutationKind::ChildList) {
            self.register_code_blocks(blocks)
        } else {
            0
        }
    }

    pub fn has_button(&self, block_id: &str) -> bool {
        self.buttons.contains(block_id)
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    pub fn remove_button(&mut self, block_id: &str) -> bool {
        self.buttons.remove(block_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, tag: &str, has_parent: bool) -> CodeBlock {
        CodeBlock {
            id: id.to_string(),
            tag: tag.to_string(),
            classes: Vec::new(),
            has_parent,
            text: format!("text of {}", id),
        }
    }

    #[test]
    fn test_indicator_lifetime() {
        let mut affordances = Affordances::new();
        let t0 = Instant::now();
        affordances.show_indicator(t0);
        assert!(affordances.indicator_visible(t0 + Duration::from_millis(1700)));
        assert!(!affordances.indicator_visible(t0 + Duration::from_millis(1800)));

        affordances.sweep(t0 + Duration::from_millis(1900));
        assert!(!affordances.indicator_visible(t0));
    }

    #[test]
    fn test_blocks_registered_once() {
        let mut affordances = Affordances::new();
        let blocks = vec![block("a", "code", true), block("b", "p", true), block("c", "code", false)];
        assert_eq!(affordances.register_code_blocks(&blocks), 1);
        assert_eq!(affordances.register_code_blocks(&blocks), 0);
        assert!(affordances.has_button("a"));
        assert!(!affordances.has_button("b"));
    }

    #[test]
    fn test_only_child_list_mutations_rescan() {
        let mut affordances = Affordances::new();
        let blocks = vec![block("a", "code", true)];
        assert_eq!(affordances.on_mutations(&[MutationKind::Attributes], &blocks), 0);
        assert_eq!(
            affordances.on_mutations(&[MutationKind::CharacterData, MutationKind::ChildList], &blocks),
            1
        );
    }

    #[test]
    fn test_removed_button_is_not_re_added() {
        let mut affordances = Affordances::new();
        let blocks = vec![block("a", "code", true)];
        affordances.register_code_blocks(&blocks);
        assert!(affordances.remove_button("a"));
        assert_eq!(affordances.on_mutations(&[MutationKind::ChildList], &blocks), 0);
        assert_eq!(affordances.button_count(), 0);
    }
}
