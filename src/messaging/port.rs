use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::protocol::{Request, Response};
use crate::browser::TabId;

/// Why a message could not be delivered. None of these are user-facing errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    #[error("Extension context invalidated")]
    ContextInvalidated,
    #[error("Could not establish connection. Receiving end does not exist")]
    NoReceiver,
    #[error("The message channel closed before a response was received")]
    ChannelClosed,
}

/// Outcome of a cross-context send. `Unavailable` is distinct from "delivered, but empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    Delivered(T),
    Unavailable(Unavailable),
}

impl<T> Delivery<T> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered(_))
    }

    pub fn delivered(self) -> Option<T> {
        match self {
            Delivery::Delivered(value) => Some(value),
            Delivery::Unavailable(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Delivery<U> {
        match self {
            Delivery::Delivered(value) => Delivery::Delivered(f(value)),
            Delivery::Unavailable(reason) => Delivery::Unavailable(reason),
        }
    }
}

/// Who sent a message. Content scripts carry their tab; panels and the
/// background do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageSender {
    pub tab: Option<TabId>,
}

impl MessageSender {
    pub fn extension() -> Self {
        Self { tab: None }
    }

    pub fn tab(tab: TabId) -> Self {
        Self { tab: Some(tab) }
    }
}

/// Receiving side of a context. Returning `None` leaves the sender without a reply.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request, sender: MessageSender) -> Option<Response>;
}

struct Envelope {
    request: Request,
    sender: MessageSender,
    reply: Option<oneshot::Sender<Response>>,
}

/// Sending half of a context's message listener.
#[derive(Clone)]
pub struct Port {
    name: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Port {
    /// Starts a listener task that feeds every message to `handler`, one at a time.
    pub fn listen(name: impl Into<String>, handler: Arc<dyn MessageHandler>) -> (Port, JoinHandle<()>) {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let listener_name = name.clone();

        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let action = envelope.request.action();
                let response = handler.handle(envelope.request, envelope.sender).await;
                match (envelope.reply, response) {
                    (Some(reply), Some(response)) => {
                        if reply.send(response).is_err() {
                            debug!("{}: sender of {} stopped waiting", listener_name, action);
                        }
                    }
                    (Some(_), None) => debug!("{}: no reply for {}", listener_name, action),
                    (None, _) => {}
                }
            }
            debug!("{}: listener stopped", listener_name);
        });

        (Port { name, tx }, task)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Sends and waits for the reply.
    pub async fn request(&self, request: Request, sender: MessageSender) -> Delivery<Response> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            request,
            sender,
            reply: Some(reply_tx),
        };
        if self.tx.send(envelope).is_err() {
            return Delivery::Unavailable(Unavailable::NoReceiver);
        }
        match reply_rx.await {
            Ok(response) => Delivery::Delivered(response),
            Err(_) => Delivery::Unavailable(Unavailable::ChannelClosed),
        }
    }

    /// Fire-and-forget send.
    pub fn post(&self, request: Request, sender: MessageSender) -> Delivery<()> {
        let envelope = Envelope {
            request,
            sender,
            reply: None,
        };
        match self.tx.send(envelope) {
            Ok(()) => Delivery::Delivered(()),
            Err(_) => Delivery::Unavailable(Unavailable::NoReceiver),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle(&self, request: Request, _sender: MessageSender) -> Option<Response> {
            match request {
                Request::OpenPopup => Some(Response::ack()),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_request_reply() {
        let (port, _task) = Port::listen("echo", Arc::new(Echo));
        let delivery = port.request(Request::OpenPopup, MessageSender::extension()).await;
        assert_eq!(delivery, Delivery::Delivered(Response::ack()));
    }

    #[tokio::test]
    async fn test_no_reply_is_channel_closed() {
        let (port, _task) = Port::listen("echo", Arc::new(Echo));
        let delivery = port.request(Request::GetEditorCode, MessageSender::extension()).await;
        assert_eq!(delivery, Delivery::Unavailable(Unavailable::ChannelClosed));
    }

    #[tokio::test]
    async fn test_stopped_listener_is_no_receiver() {
        let (port, task) = Port::listen("echo", Arc::new(Echo));
        task.abort();
        let _ = task.await;
        assert!(port.is_closed());
        assert_eq!(
            port.post(Request::OpenPopup, MessageSender::extension()),
            Delivery::Unavailable(Unavailable::NoReceiver)
        );
    }
}
