//! Discriminator-keyed handler tables.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{MESSAGING_TARGET, MessageContext, MessageType};
use crate::error::RtiError;

/// Performs one operation for one [`MessageType`].
///
/// `C` is the shared context a handler is wired against: the owning
/// federation on the authority side, the session on the federate side.
pub trait MessageHandler<C>: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Called once while the owning sink is built.
    fn configure(&mut self, shared: &C) -> Result<(), RtiError>;

    /// Performs the operation and resolves `context`.
    ///
    /// Returning an error is equivalent to resolving the context with it.
    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError>;
}

/// Builds an unconfigured handler.
pub type HandlerFactory<C> = fn() -> Box<dyn MessageHandler<C>>;

/// Shared context captured by a handler's `configure`.
pub(crate) struct Configured<C>(Option<C>);

impl<C> Default for Configured<C> {
    fn default() -> Self {
        Self(None)
    }
}

impl<C: Clone> Configured<C> {
    pub(crate) fn set(&mut self, shared: &C) {
        self.0 = Some(shared.clone());
    }

    pub(crate) fn get(&self, handler: &str) -> Result<&C, RtiError> {
        self.0
            .as_ref()
            .ok_or_else(|| RtiError::internal(format!("handler {handler} used before configure")))
    }
}

/// Whether a sink found a handler for a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler ran and the context is resolved.
    Handled,
    /// No handler is registered; the context is untouched.
    Unhandled,
}

/// Maps message types to configured handlers for one direction and role.
pub struct MessageSink<C> {
    name: String,
    handlers: HashMap<MessageType, Box<dyn MessageHandler<C>>>,
}

impl<C> MessageSink<C> {
    /// Creates an empty sink.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
        }
    }

    /// Builds a sink from a handler table, configuring each handler against
    /// `shared`.
    ///
    /// # Errors
    ///
    /// Propagates the first configuration failure, or an internal error when
    /// the table names a message type twice.
    pub fn from_table(
        name: impl Into<String>,
        table: &[(MessageType, HandlerFactory<C>)],
        shared: &C,
    ) -> Result<Self, RtiError> {
        let mut sink = Self::new(name);
        for (message_type, factory) in table {
            sink.register(*message_type, factory(), shared)?;
        }
        Ok(sink)
    }

    /// Configures `handler` and registers it for `message_type`.
    ///
    /// # Errors
    ///
    /// Fails when the handler cannot be configured or a handler is already
    /// registered for the type.
    pub fn register(
        &mut self,
        message_type: MessageType,
        mut handler: Box<dyn MessageHandler<C>>,
        shared: &C,
    ) -> Result<(), RtiError> {
        if self.handlers.contains_key(&message_type) {
            return Err(RtiError::internal(format!(
                "sink {} already has a handler for {message_type}",
                self.name
            )));
        }
        handler.configure(shared)?;
        debug!(
            target: MESSAGING_TARGET,
            sink = %self.name,
            %message_type,
            handler = handler.name(),
            "handler registered"
        );
        self.handlers.insert(message_type, handler);
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn handles(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Routes `context` to its handler.
    ///
    /// A handler error becomes the context's error. A handler that returns
    /// without resolving the context has it resolved with an internal error.
    pub fn process(&self, context: &mut MessageContext) -> Dispatch {
        let message_type = context.message().message_type();
        let Some(handler) = self.handlers.get(&message_type) else {
            warn!(
                target: MESSAGING_TARGET,
                sink = %self.name,
                %message_type,
                "no handler registered; message left unresolved"
            );
            return Dispatch::Unhandled;
        };

        match handler.process(context) {
            Ok(()) if !context.is_resolved() => {
                context.error(RtiError::internal(format!(
                    "handler {} left {message_type} unresolved",
                    handler.name()
                )));
            }
            Ok(()) => {}
            Err(error) => {
                debug!(
                    target: MESSAGING_TARGET,
                    sink = %self.name,
                    %message_type,
                    handler = handler.name(),
                    error = %error,
                    "handler failed"
                );
                context.error_if_pending(error);
            }
        }
        Dispatch::Handled
    }
}

impl<C> std::fmt::Debug for MessageSink<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        types.sort();
        f.debug_struct("MessageSink")
            .field("name", &self.name)
            .field("handlers", &types)
            .finish()
    }
}
