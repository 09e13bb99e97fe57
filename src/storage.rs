use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

pub const SELECTED_TEXT_KEY: &str = "selectedText";
pub const EDITOR_CODE_KEY: &str = "editorCode";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const SELECTED_AT_KEY: &str = "selectedAt";
pub const LAST_ANALYSIS_KEY: &str = "lastAnalysis";
pub const LOGGED_IN_KEY: &str = "codeAssistantLoggedIn";
pub const USER_EMAIL_KEY: &str = "codeAssistantUserEmail";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Which storage area a change happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Extension-wide storage shared by background, content scripts and panels.
    Local,
    /// Storage private to one panel document (login state).
    Page,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Shared key-value storage reachable from every extension context.
///
/// Writes are last-writer-wins per key; there is no locking across keys or
/// across contexts beyond the atomicity of a single `set_items` call.
pub trait EphemeralStorage: Send + Sync {
    fn area(&self) -> StorageArea;

    fn get(&self, key: &str) -> Option<Value>;

    fn set_items(&self, items: Map<String, Value>);

    fn remove(&self, keys: &[&str]);

    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    fn set(&self, key: &str, value: Value) {
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        self.set_items(items);
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// In-memory storage area, the headless stand-in for `chrome.storage.local`.
pub struct MemoryStorage {
    area: StorageArea,
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStorage {
    pub fn new(area: StorageArea) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            area,
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn local() -> Self {
        Self::new(StorageArea::Local)
    }

    pub fn page() -> Self {
        Self::new(StorageArea::Page)
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    fn notify(&self, change: StorageChange) {
        // No subscribers is the common case for the popup; ignore the send error.
        let _ = self.changes.send(change);
    }
}

impl EphemeralStorage for MemoryStorage {
    fn area(&self) -> StorageArea {
        self.area
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn set_items(&self, items: Map<String, Value>) {
        let mut changed = Vec::with_capacity(items.len());
        {
            let mut values = self.values.lock();
            for (key, new_value) in items {
                let old_value = values.insert(key.clone(), new_value.clone());
                if old_value.as_ref() != Some(&new_value) {
                    changed.push(StorageChange {
                        area: self.area,
                        key,
                        old_value,
                        new_value: Some(new_value),
                    });
                }
            }
        }
        for change in changed {
            debug!("storage[{:?}] set {}", change.area, change.key);
            self.notify(change);
        }
    }

    fn remove(&self, keys: &[&str]) {
        let mut removed = Vec::new();
        {
            let mut values = self.values.lock();
            for key in keys {
                if let Some(old_value) = values.remove(*key) {
                    removed.push(StorageChange {
                        area: self.area,
                        key: key.to_string(),
                        old_value: Some(old_value),
                        new_value: None,
                    });
                }
            }
        }
        for change in removed {
            debug!("storage[{:?}] removed {}", change.area, change.key);
            self.notify(change);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let storage = MemoryStorage::local();
        storage.set(SELECTED_TEXT_KEY, json!("hello"));
        assert_eq!(storage.get_string(SELECTED_TEXT_KEY).as_deref(), Some("hello"));

        storage.remove(&[SELECTED_TEXT_KEY, EDITOR_CODE_KEY]);
        assert!(storage.get(SELECTED_TEXT_KEY).is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_get_string_ignores_non_strings() {
        let storage = MemoryStorage::local();
        storage.set(TIMESTAMP_KEY, json!(42));
        assert!(storage.get_string(TIMESTAMP_KEY).is_none());
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let storage = MemoryStorage::local();
        let mut changes = storage.subscribe();

        storage.set(SELECTED_TEXT_KEY, json!("a"));
        // Same value again is not a change.
        storage.set(SELECTED_TEXT_KEY, json!("a"));
        storage.remove(&[SELECTED_TEXT_KEY]);

        let first = changes.recv().await.unwrap();
        assert_eq!(first.key, SELECTED_TEXT_KEY);
        assert_eq!(first.area, StorageArea::Local);
        assert_eq!(first.new_value, Some(json!("a")));

        let second = changes.recv().await.unwrap();
        assert_eq!(second.old_value, Some(json!("a")));
        assert!(second.new_value.is_none());
        assert!(changes.try_recv().is_err());
    }
}
