//! Message passing between the page, background and panel contexts.
//!
//! Contexts share no memory; they exchange [`Request`]s over [`Port`]s and
//! get a [`Delivery`] back that tells "no data" apart from "nobody listening".

pub mod port;
pub mod protocol;
pub mod runtime;

pub use port::{Delivery, MessageHandler, MessageSender, Port, Unavailable};
pub use protocol::{FrameMessage, Request, Response, SIDEBAR_SOURCE};
pub use runtime::{ExtensionRuntime, RuntimeHandle};
