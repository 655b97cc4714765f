//! The federate-facing session.
//!
//! A [`Session`] is one participant's view of the authority. Requests go
//! through an outgoing sink whose handlers validate locally before anything
//! is sent, and notices arrive on a callback queue that can be polled or
//! pushed to a [`CallbackListener`].

mod callbacks;
mod handlers;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rti_config::Config;
use tracing::{debug, warn};

use crate::connection::{Connection, Exchange, session_connection};
use crate::error::RtiError;
use crate::handles::{FederateHandle, FederationHandle};
use crate::messaging::{
    Broadcast, ControlMessage, Dispatch, FederationSummary, HlaVersion, MessageContext,
    MessageSink, Notice, Payload, Request, SchemaRef,
};

pub use callbacks::CallbackListener;
use callbacks::CallbackQueue;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// The federation a session is joined to and its identity there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    federation_name: String,
    federation: FederationHandle,
    federate_name: String,
    federate: FederateHandle,
}

impl Membership {
    #[must_use]
    pub fn federation_name(&self) -> &str {
        &self.federation_name
    }

    #[must_use]
    pub fn federation(&self) -> FederationHandle {
        self.federation
    }

    #[must_use]
    pub fn federate_name(&self) -> &str {
        &self.federate_name
    }

    #[must_use]
    pub fn federate(&self) -> FederateHandle {
        self.federate
    }
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    membership: Mutex<Option<Membership>>,
}

impl SessionState {
    pub(crate) fn membership(&self) -> Result<Option<Membership>, RtiError> {
        self.membership
            .lock()
            .map(|membership| membership.clone())
            .map_err(|_| RtiError::poisoned("session membership"))
    }

    pub(crate) fn require_membership(&self) -> Result<Membership, RtiError> {
        self.membership()?.ok_or(RtiError::NotJoined)
    }

    pub(crate) fn set_membership(&self, membership: Option<Membership>) -> Result<(), RtiError> {
        *self
            .membership
            .lock()
            .map_err(|_| RtiError::poisoned("session membership"))? = membership;
        Ok(())
    }
}

/// What outgoing handlers are wired against.
#[derive(Clone)]
pub(crate) struct SessionScope {
    pub(crate) state: Arc<SessionState>,
    pub(crate) connection: Arc<dyn Connection>,
}

/// A connected federate session.
///
/// Control requests are issued one at a time; concurrent callers queue on
/// the session.
pub struct Session {
    connection: Arc<dyn Connection>,
    state: Arc<SessionState>,
    outgoing: MessageSink<SessionScope>,
    callbacks: CallbackQueue,
    in_flight: Mutex<()>,
}

impl Session {
    /// Attaches a new session to `exchange` using the binding `config`
    /// selects.
    ///
    /// # Errors
    ///
    /// [`RtiError::Configuration`] for an unsupported connection type and
    /// [`RtiError::Internal`] when no authority is attached.
    pub fn connect(config: &Config, exchange: &Arc<Exchange>) -> Result<Self, RtiError> {
        Self::with_connection(session_connection(config, exchange)?)
    }

    /// Connects `connection` and wires the outgoing sink against it.
    ///
    /// # Errors
    ///
    /// Propagates connection failures.
    pub fn with_connection(connection: Arc<dyn Connection>) -> Result<Self, RtiError> {
        connection.connect()?;
        let notices = connection.notices()?;
        let state = Arc::new(SessionState::default());
        let scope = SessionScope {
            state: Arc::clone(&state),
            connection: Arc::clone(&connection),
        };
        let outgoing = MessageSink::from_table(
            format!("{}-outgoing", connection.name()),
            handlers::OUTGOING,
            &scope,
        )?;
        debug!(target: SESSION_TARGET, session = %connection.name(), "session connected");
        Ok(Self {
            connection,
            state,
            outgoing,
            callbacks: CallbackQueue::new(notices),
            in_flight: Mutex::new(()),
        })
    }

    fn request(&self, message: ControlMessage) -> Result<Payload, RtiError> {
        let _serialised = self
            .in_flight
            .lock()
            .map_err(|_| RtiError::poisoned("session request"))?;
        let message_type = message.message_type();
        let mut context = MessageContext::new(message);
        if self.outgoing.process(&mut context) == Dispatch::Unhandled {
            return Err(RtiError::internal(format!(
                "no outgoing handler for {message_type}"
            )));
        }
        context.into_result()
    }

    fn send(&self, request: Request) -> Result<Payload, RtiError> {
        self.request(ControlMessage::new(request))
    }

    /// # Errors
    ///
    /// [`RtiError::FederationAlreadyExists`] when the name is taken.
    pub fn create_federation(
        &self,
        name: &str,
        schema: SchemaRef,
        version: HlaVersion,
    ) -> Result<FederationHandle, RtiError> {
        match self.send(Request::CreateFederation {
            name: name.to_owned(),
            schema,
            version,
        })? {
            Payload::FederationCreated { federation } => Ok(federation),
            other => Err(unexpected("create", &other)),
        }
    }

    /// # Errors
    ///
    /// [`RtiError::FederationDoesNotExist`] or
    /// [`RtiError::FederatesCurrentlyJoined`].
    pub fn destroy_federation(&self, name: &str) -> Result<(), RtiError> {
        self.send(Request::DestroyFederation {
            name: name.to_owned(),
        })
        .map(drop)
    }

    /// Joins `federation` as `federate` and returns the federate handle
    /// followed by the federation handle.
    ///
    /// # Errors
    ///
    /// [`RtiError::AlreadyMember`] while this session is joined,
    /// [`RtiError::FederationDoesNotExist`] and
    /// [`RtiError::FederateNameInUse`].
    pub fn join_federation(
        &self,
        federation: &str,
        federate: &str,
    ) -> Result<(FederateHandle, FederationHandle), RtiError> {
        match self.send(Request::JoinFederation {
            federation: federation.to_owned(),
            federate: federate.to_owned(),
        })? {
            Payload::Joined {
                federate,
                federation,
            } => Ok((federate, federation)),
            other => Err(unexpected("join", &other)),
        }
    }

    /// # Errors
    ///
    /// [`RtiError::NotJoined`] when this session holds no membership.
    pub fn resign_federation(&self) -> Result<(), RtiError> {
        let membership = self.state.require_membership()?;
        self.send(Request::ResignFederation {
            federation: membership.federation_name,
            federate: membership.federate,
        })
        .map(drop)
    }

    /// # Errors
    ///
    /// Fails only on transport errors.
    pub fn list_federations(&self) -> Result<Vec<FederationSummary>, RtiError> {
        match self.send(Request::ListFederations)? {
            Payload::Federations(summaries) => Ok(summaries),
            other => Err(unexpected("list", &other)),
        }
    }

    /// Round-trips to the authority and returns its clock in milliseconds
    /// since the Unix epoch.
    ///
    /// # Errors
    ///
    /// [`RtiError::Timeout`] when the authority does not answer in time.
    pub fn ping(&self) -> Result<u128, RtiError> {
        match self.send(Request::Ping)? {
            Payload::Pong { server_time_ms } => Ok(server_time_ms),
            other => Err(unexpected("ping", &other)),
        }
    }

    /// Registers `label`. An empty `targets` set makes the point
    /// federation-wide.
    ///
    /// # Errors
    ///
    /// [`RtiError::NotJoined`], [`RtiError::SyncPointAlreadyExists`] and
    /// [`RtiError::InvalidSyncSet`].
    pub fn register_sync_point(
        &self,
        label: &str,
        tag: &[u8],
        targets: impl IntoIterator<Item = FederateHandle>,
    ) -> Result<(), RtiError> {
        self.send(Request::RegisterSyncPoint {
            label: label.to_owned(),
            tag: tag.to_vec(),
            targets: targets.into_iter().collect::<BTreeSet<_>>(),
        })
        .map(drop)
    }

    /// # Errors
    ///
    /// [`RtiError::NotJoined`], [`RtiError::SyncPointDoesNotExist`] and
    /// [`RtiError::NotInSyncSet`].
    pub fn achieve_sync_point(&self, label: &str) -> Result<(), RtiError> {
        self.send(Request::AchieveSyncPoint {
            label: label.to_owned(),
        })
        .map(drop)
    }

    /// Sends `payload` to every other federate of this session's federation.
    ///
    /// # Errors
    ///
    /// [`RtiError::NotJoined`] when this session holds no membership.
    pub fn send_broadcast(&self, payload: Vec<u8>) -> Result<(), RtiError> {
        let membership = self.state.require_membership()?;
        self.connection.send_broadcast(Broadcast::to_federation(
            membership.federation,
            membership.federate,
            payload,
        ))
    }

    /// Current membership, if joined.
    ///
    /// # Errors
    ///
    /// Fails only when the state lock is poisoned.
    pub fn membership(&self) -> Result<Option<Membership>, RtiError> {
        self.state.membership()
    }

    /// Waits up to `timeout` for the next notice. Returns `None` on expiry
    /// and whenever immediate callbacks are enabled.
    ///
    /// # Errors
    ///
    /// Fails only when the dispatcher lock is poisoned.
    pub fn poll_callback(&self, timeout: Duration) -> Result<Option<Notice>, RtiError> {
        self.callbacks.poll(timeout)
    }

    /// Like [`Self::poll_callback`] without waiting.
    ///
    /// # Errors
    ///
    /// Fails only when the dispatcher lock is poisoned.
    pub fn try_callback(&self) -> Result<Option<Notice>, RtiError> {
        self.callbacks.try_next()
    }

    /// Pushes every subsequent notice to `listener` on a background thread.
    ///
    /// # Errors
    ///
    /// Internal error when the dispatcher thread cannot be started.
    pub fn enable_immediate_callbacks(
        &self,
        listener: Arc<dyn CallbackListener>,
    ) -> Result<(), RtiError> {
        self.callbacks.enable(listener)
    }

    /// Stops the background dispatcher; notices queue for polling again.
    ///
    /// # Errors
    ///
    /// Fails only when the dispatcher lock is poisoned.
    pub fn disable_immediate_callbacks(&self) -> Result<(), RtiError> {
        self.callbacks.disable()
    }

    /// Stops callbacks and detaches from the exchange.
    ///
    /// # Errors
    ///
    /// Propagates connection failures.
    pub fn disconnect(&self) -> Result<(), RtiError> {
        self.callbacks.disable()?;
        self.connection.disconnect()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(error) = self.disconnect() {
            warn!(target: SESSION_TARGET, error = %error, "session disconnect failed");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection.name())
            .field("membership", &self.state.membership().ok().flatten())
            .finish_non_exhaustive()
    }
}

fn unexpected(operation: &str, payload: &Payload) -> RtiError {
    RtiError::internal(format!("{operation} answered with {payload:?}"))
}
