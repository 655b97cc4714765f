//! Error taxonomy shared by sessions and the coordination authority.
//!
//! Every failure surfaced by a public operation is an [`RtiError`]. Each
//! variant carries enough context for an actionable message and maps onto
//! exactly one [`ErrorKind`], which is what callers match on when they only
//! care about the class of failure.

use std::time::Duration;

use rti_config::ConnectionType;
use strum::Display;
use thiserror::Error;

use crate::handles::FederateHandle;
use crate::messaging::MessageType;

/// Coarse classification of an [`RtiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unsupported startup configuration.
    Configuration,
    /// A federation name or synchronization label is already registered.
    AlreadyExists,
    /// Reference to an unknown federation, federate or label.
    DoesNotExist,
    /// Federate name collides case-insensitively inside a federation.
    NameInUse,
    /// The session already holds a federation membership.
    AlreadyMember,
    /// The operation is not legal in the current state.
    PreconditionFailed,
    /// Invariant violation or unreachable state.
    Internal,
    /// No response arrived before the caller's deadline.
    Timeout,
}

/// Errors surfaced by RTI operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RtiError {
    /// Startup configuration could not be honoured.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A federation with this name already exists.
    #[error("federation already exists: {name}")]
    FederationAlreadyExists { name: String },

    /// A synchronization point with this label is already registered.
    #[error("synchronization point already registered: {label}")]
    SyncPointAlreadyExists { label: String },

    /// No federation with this name exists.
    #[error("federation does not exist: {name}")]
    FederationDoesNotExist { name: String },

    /// No synchronization point with this label exists.
    #[error("synchronization point does not exist: {label}")]
    SyncPointDoesNotExist { label: String },

    /// The federate is not joined to the federation it addressed.
    #[error("federate {handle} is not joined to federation {federation}")]
    FederateNotJoined {
        handle: FederateHandle,
        federation: String,
    },

    /// Another federate already uses this name.
    #[error("federate name [{name}] already in use in federation [{federation}]")]
    FederateNameInUse { name: String, federation: String },

    /// The session is already joined somewhere.
    #[error("already joined to federation [{federation}] as federate [{federate}]")]
    AlreadyMember { federation: String, federate: String },

    /// The federation still has joined federates.
    #[error("federates currently joined to federation [{name}]")]
    FederatesCurrentlyJoined { name: String },

    /// The federate was not named by a restricted synchronization point.
    #[error("federate {handle} is not in the synchronization set of [{label}]")]
    NotInSyncSet {
        label: String,
        handle: FederateHandle,
    },

    /// A restricted registration named a federate that is not joined.
    #[error("synchronization set of [{label}] names unknown federate {handle}")]
    InvalidSyncSet {
        label: String,
        handle: FederateHandle,
    },

    /// The session must be joined to a federation first.
    #[error("not joined to a federation")]
    NotJoined,

    /// The authority did not resolve a control request in time.
    #[error("no response within {}ms", waited.as_millis())]
    Timeout { waited: Duration },

    /// Invariant violation.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RtiError {
    /// Builds an [`RtiError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Builds an [`RtiError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Configuration error for a connection type with no working binding.
    pub fn unsupported_connection(connection: ConnectionType) -> Self {
        Self::configuration(format!("unsupported connection type: {connection}"))
    }

    /// Internal error for a handler given a request it was not wired for.
    pub(crate) fn unexpected_request(handler: &str, message_type: MessageType) -> Self {
        Self::internal(format!("handler {handler} cannot process {message_type}"))
    }

    /// Internal error raised when a mutex was poisoned by a panicking holder.
    pub(crate) fn poisoned(what: &str) -> Self {
        Self::internal(format!("{what} lock poisoned"))
    }

    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::FederationAlreadyExists { .. } | Self::SyncPointAlreadyExists { .. } => {
                ErrorKind::AlreadyExists
            }
            Self::FederationDoesNotExist { .. }
            | Self::SyncPointDoesNotExist { .. }
            | Self::FederateNotJoined { .. } => ErrorKind::DoesNotExist,
            Self::FederateNameInUse { .. } => ErrorKind::NameInUse,
            Self::AlreadyMember { .. } => ErrorKind::AlreadyMember,
            Self::FederatesCurrentlyJoined { .. }
            | Self::NotInSyncSet { .. }
            | Self::InvalidSyncSet { .. }
            | Self::NotJoined => ErrorKind::PreconditionFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}
