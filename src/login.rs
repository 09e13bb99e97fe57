use std::sync::Arc;

use log::info;
use serde_json::{json, Map};

use crate::storage::{EphemeralStorage, LOGGED_IN_KEY, USER_EMAIL_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginState {
    pub logged_in: bool,
    pub email: Option<String>,
}

/// Login flag and email kept in the panel's page storage.
#[derive(Clone)]
pub struct LoginStore {
    storage: Arc<dyn EphemeralStorage>,
}

impl LoginStore {
    pub fn new(storage: Arc<dyn EphemeralStorage>) -> Self {
        Self { storage }
    }

    pub fn state(&self) -> LoginState {
        LoginState {
            logged_in: self.storage.get_string(LOGGED_IN_KEY).as_deref() == Some("1"),
            email: self.storage.get_string(USER_EMAIL_KEY).filter(|e| !e.is_empty()),
        }
    }

    /// Email sent along with analysis requests; empty when unknown.
    pub fn email(&self) -> String {
        self.state().email.unwrap_or_default()
    }

    pub fn log_in(&self, email: &str) {
        let mut items = Map::new();
        items.insert(LOGGED_IN_KEY.to_string(), json!("1"));
        items.insert(USER_EMAIL_KEY.to_string(), json!(email));
        self.storage.set_items(items);
        info!("🔐 Logged in as {}", email);
    }

    pub fn logout(&self) {
        self.storage.remove(&[LOGGED_IN_KEY, USER_EMAIL_KEY]);
        info!("🔓 Logged out");
    }
}
