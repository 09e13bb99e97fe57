use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::storage::{EphemeralStorage, EDITOR_CODE_KEY, SELECTED_TEXT_KEY, TIMESTAMP_KEY};

/// Maximum age, in milliseconds, of a captured payload the panel will honour.
pub const FRESHNESS_THRESHOLD_MS: u64 = 30_000;

/// Joins a question and the editor stub when both are shown in one input field.
pub const EDITOR_SEPARATOR: &str = "\n\n----\nLeetCode Function Stub:\n\n";

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Builds the text an input field is pre-filled with: the selection, followed by
/// the editor code under a labelled separator when there is any code.
pub fn compose_input(selected_text: &str, editor_code: &str) -> String {
    if editor_code.is_empty() {
        selected_text.to_string()
    } else {
        format!("{}{}{}", selected_text, EDITOR_SEPARATOR, editor_code)
    }
}

/// Text captured from a page, handed from the background coordinator to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPayload {
    pub selected_text: String,
    pub editor_code: String,
    /// Capture time in epoch milliseconds.
    pub timestamp: i64,
}

impl CapturedPayload {
    pub fn new(selected_text: impl Into<String>, editor_code: impl Into<String>) -> Self {
        Self::captured_at(selected_text, editor_code, now_ms())
    }

    pub fn captured_at(
        selected_text: impl Into<String>,
        editor_code: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            selected_text: selected_text.into(),
            editor_code: editor_code.into(),
            timestamp,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }

    pub fn input_text(&self) -> String {
        compose_input(&self.selected_text, &self.editor_code)
    }
}

/// The one-slot hand-off record in shared storage.
///
/// Producers overwrite the slot with `put`; the consumer calls `take_if_fresh`,
/// which only returns (and deletes) a payload with a selection that is no older
/// than the given age. Other payloads are left in place and ignored.
#[derive(Clone)]
pub struct HandoffSlot {
    storage: Arc<dyn EphemeralStorage>,
}

impl HandoffSlot {
    pub fn new(storage: Arc<dyn EphemeralStorage>) -> Self {
        Self { storage }
    }

    pub fn put(&self, payload: &CapturedPayload) {
        let mut items = Map::new();
        items.insert(SELECTED_TEXT_KEY.to_string(), json!(payload.selected_text));
        items.insert(EDITOR_CODE_KEY.to_string(), json!(payload.editor_code));
        items.insert(TIMESTAMP_KEY.to_string(), json!(payload.timestamp));
        self.storage.set_items(items);
        info!(
            "📥 Stored captured payload (selection: {} chars, editor: {} chars)",
            payload.selected_text.chars().count(),
            payload.editor_code.chars().count()
        );
    }

    /// Reads the slot without consuming it. A slot without a timestamp is empty.
    pub fn peek(&self) -> Option<CapturedPayload> {
        let timestamp = self.storage.get(TIMESTAMP_KEY)?.as_i64()?;
        Some(CapturedPayload {
            selected_text: self.storage.get_string(SELECTED_TEXT_KEY).unwrap_or_default(),
            editor_code: self.storage.get_string(EDITOR_CODE_KEY).unwrap_or_default(),
            timestamp,
        })
    }

    pub fn take_if_fresh(&self, max_age_ms: u64) -> Option<CapturedPayload> {
        self.take_if_fresh_at(max_age_ms, now_ms())
    }

    pub fn take_if_fresh_at(&self, max_age_ms: u64, now_ms: i64) -> Option<CapturedPayload> {
        let payload = self.peek()?;
        // Only a captured selection is handed off; code alone is left for the live query.
        if payload.selected_text.is_empty() {
            debug!("Hand-off slot holds no selection, ignoring it");
            return None;
        }

        let age = payload.age_ms(now_ms);
        if age > i64::try_from(max_age_ms).unwrap_or(i64::MAX) {
            debug!("Hand-off payload is stale ({} ms old, limit {} ms)", age, max_age_ms);
            return None;
        }

        self.clear();
        Some(payload)
    }

    pub fn clear(&self) {
        self.storage
            .remove(&[SELECTED_TEXT_KEY, EDITOR_CODE_KEY, TIMESTAMP_KEY]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn slot() -> (HandoffSlot, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::local());
        (HandoffSlot::new(storage.clone()), storage)
    }

    #[test]
    fn test_fresh_payload_is_consumed_and_cleared() {
        let (slot, storage) = slot();
        let t = 1_700_000_000_000;
        slot.put(&CapturedPayload::captured_at("abc", "", t));

        let taken = slot.take_if_fresh_at(FRESHNESS_THRESHOLD_MS, t + 30_000).unwrap();
        assert_eq!(taken.selected_text, "abc");
        assert_eq!(taken.input_text(), "abc");
        assert!(storage.is_empty());
        assert!(slot.take_if_fresh_at(FRESHNESS_THRESHOLD_MS, t + 30_000).is_none());
    }

    #[test]
    fn test_stale_payload_is_ignored_but_kept() {
        let (slot, _storage) = slot();
        let t = 1_700_000_000_000;
        slot.put(&CapturedPayload::captured_at("abc", "", t));

        assert!(slot.take_if_fresh_at(FRESHNESS_THRESHOLD_MS, t + 30_001).is_none());
        assert!(slot.peek().is_some());
    }

    #[test]
    fn test_code_only_payload_is_not_consumed() {
        let (slot, _storage) = slot();
        let t = 1_700_000_000_000;
        slot.put(&CapturedPayload::captured_at("", "class Solution: pass", t));

        assert!(slot.take_if_fresh_at(FRESHNESS_THRESHOLD_MS, t + 1).is_none());
        assert_eq!(slot.peek().unwrap().editor_code, "class Solution: pass");
    }

    #[test]
    fn test_huge_max_age_never_expires() {
        let (slot, _storage) = slot();
        slot.put(&CapturedPayload::captured_at("abc", "", 0));

        let taken = slot.take_if_fresh_at(u64::MAX, 1_700_000_000_000);
        assert_eq!(taken.map(|p| p.selected_text).as_deref(), Some("abc"));
    }

    #[test]
    fn test_last_write_wins() {
        let (slot, _storage) = slot();
        slot.put(&CapturedPayload::captured_at("first", "", 10));
        slot.put(&CapturedPayload::captured_at("second", "fn x() {}", 20));

        let taken = slot.take_if_fresh_at(FRESHNESS_THRESHOLD_MS, 30).unwrap();
        assert_eq!(taken, CapturedPayload::captured_at("second", "fn x() {}", 20));
    }

    #[test]
    fn test_compose_input_with_editor_code() {
        let payload = CapturedPayload::captured_at("Q", "def foo(): pass", 0);
        assert_eq!(
            payload.input_text(),
            "Q\n\n----\nLeetCode Function Stub:\n\ndef foo(): pass"
        );
    }

    #[test]
    fn test_missing_timestamp_means_empty_slot() {
        let (slot, storage) = slot();
        storage.set(SELECTED_TEXT_KEY, json!("orphan"));
        assert!(slot.peek().is_none());
        assert!(slot.take_if_fresh(FRESHNESS_THRESHOLD_MS).is_none());
    }
}
