use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use super::port::{Delivery, MessageSender, Port, Unavailable};
use super::protocol::{Request, Response};

/// One loaded instance of the extension. Reloading or updating the extension
/// invalidates every `RuntimeHandle` handed out by the previous instance.
pub struct ExtensionRuntime {
    valid: Arc<AtomicBool>,
    background: Port,
}

impl ExtensionRuntime {
    pub fn new(background: Port) -> Self {
        Self {
            valid: Arc::new(AtomicBool::new(true)),
            background,
        }
    }

    pub fn handle(&self, sender: MessageSender) -> RuntimeHandle {
        RuntimeHandle {
            valid: self.valid.clone(),
            background: self.background.clone(),
            sender,
        }
    }

    pub fn invalidate(&self) {
        if self.valid.swap(false, Ordering::SeqCst) {
            info!("🔌 Extension runtime invalidated; stale handles will fail locally");
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

/// A context's reference to the extension runtime (`chrome.runtime`).
#[derive(Clone)]
pub struct RuntimeHandle {
    valid: Arc<AtomicBool>,
    background: Port,
    sender: MessageSender,
}

impl RuntimeHandle {
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && !self.background.is_closed()
    }

    pub fn sender(&self) -> MessageSender {
        self.sender
    }

    /// Sends to the background and waits for its reply.
    pub async fn send_message(&self, request: Request) -> Delivery<Response> {
        if !self.is_valid() {
            warn!("Extension context invalidated, dropping {}", request.action());
            return Delivery::Unavailable(Unavailable::ContextInvalidated);
        }
        self.background.request(request, self.sender).await
    }

    /// Sends to the background without waiting.
    pub fn post_message(&self, request: Request) -> Delivery<()> {
        if !self.is_valid() {
            warn!("Extension context invalidated, dropping {}", request.action());
            return Delivery::Unavailable(Unavailable::ContextInvalidated);
        }
        self.background.post(request, self.sender)
    }
}
