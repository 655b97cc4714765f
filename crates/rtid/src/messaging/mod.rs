//! Message envelope and dispatch pipeline.
//!
//! A [`ControlMessage`] travels inside a [`MessageContext`] that is resolved
//! exactly once. Each role owns [`MessageSink`]s mapping a [`MessageType`] to a
//! configured [`MessageHandler`]; the tables are built once when the session or
//! federation is wired.

mod context;
mod message;
mod sink;

pub use context::{MessageContext, Response};
pub use message::{
    Audience, Broadcast, ControlMessage, FederationSummary, HlaVersion, MessageType, Notice,
    Payload, Request, SchemaRef,
};
pub use sink::{Dispatch, HandlerFactory, MessageHandler, MessageSink};
pub(crate) use sink::Configured;

pub(crate) const MESSAGING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::messaging");
