//! Transport-agnostic connection contract and the in-process binding.
//!
//! A [`Connection`] offers two delivery modes: a blocking control
//! request/response and fire-and-forget broadcasts. The only functional
//! binding is the in-process [`Exchange`]; other [`ConnectionType`]s are
//! rejected when the connection is configured.

mod authority;
mod exchange;
mod session;

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use rti_config::{Config, ConnectionType};

use crate::error::RtiError;
use crate::messaging::{Broadcast, MessageContext, Notice};

pub use authority::{AuthorityJvmConnection, InboxHandler};
pub use exchange::Exchange;
pub(crate) use exchange::Inbound;
pub use session::SessionJvmConnection;

pub(crate) const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Correlates a control response with the request it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resolved context travelling back to the session that asked.
#[derive(Debug)]
pub struct ControlResponse {
    request: RequestId,
    context: MessageContext,
}

impl ControlResponse {
    #[must_use]
    pub fn new(request: RequestId, context: MessageContext) -> Self {
        Self { request, context }
    }

    #[must_use]
    pub fn request(&self) -> RequestId {
        self.request
    }
}

/// Link between one endpoint and the coordination authority.
#[cfg_attr(test, mockall::automock)]
pub trait Connection: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> String;

    /// Binding this connection implements.
    fn connection_type(&self) -> ConnectionType;

    /// Attaches to the transport.
    fn connect(&self) -> Result<(), RtiError>;

    /// Detaches from the transport. Disconnecting twice is a no-op.
    fn disconnect(&self) -> Result<(), RtiError>;

    /// Sends the request in `context` and blocks until it is resolved or the
    /// configured timeout expires.
    ///
    /// On return `context` carries the authority's response. An error
    /// response is also returned as `Err`.
    fn send_control_request(&self, context: &mut MessageContext) -> Result<(), RtiError>;

    /// Completes a previously received request without blocking.
    fn send_control_response(&self, response: ControlResponse) -> Result<(), RtiError>;

    /// Fans a notice out without waiting for acknowledgement.
    fn send_broadcast(&self, broadcast: Broadcast) -> Result<(), RtiError>;

    /// Queue of notices addressed to this endpoint.
    fn notices(&self) -> Result<Receiver<Notice>, RtiError>;
}

/// Configures the session side of the binding selected by `config`.
///
/// # Errors
///
/// Returns [`RtiError::Configuration`] for bindings without an
/// implementation.
pub fn session_connection(
    config: &Config,
    exchange: &Arc<Exchange>,
) -> Result<Arc<dyn Connection>, RtiError> {
    match config.connection() {
        ConnectionType::Jvm => Ok(Arc::new(SessionJvmConnection::new(
            Arc::clone(exchange),
            config.request_timeout(),
            config.notice_queue_capacity(),
        ))),
        unsupported => Err(RtiError::unsupported_connection(unsupported)),
    }
}

/// Configures the authority side of the binding selected by `config`.
///
/// # Errors
///
/// Returns [`RtiError::Configuration`] for bindings without an
/// implementation.
pub fn authority_connection(
    name: &str,
    config: &Config,
    exchange: &Arc<Exchange>,
) -> Result<Arc<AuthorityJvmConnection>, RtiError> {
    match config.connection() {
        ConnectionType::Jvm => Ok(Arc::new(AuthorityJvmConnection::new(
            name,
            Arc::clone(exchange),
            config.notice_queue_capacity(),
        ))),
        unsupported => Err(RtiError::unsupported_connection(unsupported)),
    }
}
