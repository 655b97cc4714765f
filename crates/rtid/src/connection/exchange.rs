//! In-process rendezvous between one authority and many sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError, bounded,
};
use tracing::{debug, info, warn};

use super::{CONNECTION_TARGET, ControlResponse, RequestId};
use crate::error::RtiError;
use crate::handles::{SessionCounter, SessionId};
use crate::messaging::{Broadcast, MessageContext, Notice};

/// Work queued for the attached authority.
#[derive(Debug)]
pub(crate) enum Inbound {
    Control {
        request: RequestId,
        context: MessageContext,
    },
    Broadcast(Broadcast),
}

struct AuthorityPort {
    name: String,
    inbox: Sender<Inbound>,
}

#[derive(Default)]
struct ExchangeState {
    authority: Option<AuthorityPort>,
    sessions: HashMap<SessionId, Sender<Notice>>,
    pending: HashMap<RequestId, Sender<MessageContext>>,
}

/// Binds at most one coordination authority to any number of sessions.
///
/// An exchange is an ordinary value: construct one, share it behind an
/// [`Arc`](std::sync::Arc) with the authority and its sessions, and create
/// another for an independent deployment.
#[derive(Default)]
pub struct Exchange {
    state: Mutex<ExchangeState>,
    session_ids: SessionCounter,
    request_ids: AtomicU64,
}

impl Exchange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ExchangeState>, RtiError> {
        self.state.lock().map_err(|_| RtiError::poisoned("exchange"))
    }

    /// Returns `true` while an authority is attached.
    #[must_use]
    pub fn has_authority(&self) -> bool {
        self.lock().is_ok_and(|state| state.authority.is_some())
    }

    /// Number of attached sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().map_or(0, |state| state.sessions.len())
    }

    pub(crate) fn attach_authority(&self, name: &str, inbox: Sender<Inbound>) -> Result<(), RtiError> {
        let mut state = self.lock()?;
        if let Some(existing) = &state.authority {
            return Err(RtiError::internal(format!(
                "authority [{}] is already attached; refusing [{name}]",
                existing.name
            )));
        }
        state.authority = Some(AuthorityPort {
            name: name.to_owned(),
            inbox,
        });
        info!(target: CONNECTION_TARGET, authority = name, "authority attached");
        Ok(())
    }

    /// Detaches the authority and disconnects every session.
    ///
    /// Returns the number of sessions that were attached. Waiting callers are
    /// released with an error.
    pub(crate) fn detach_authority(&self, reason: &str) -> Result<usize, RtiError> {
        let (authority, sessions) = {
            let mut state = self.lock()?;
            let Some(authority) = state.authority.take() else {
                return Ok(0);
            };
            state.pending.clear();
            let sessions: Vec<_> = state.sessions.drain().collect();
            (authority, sessions)
        };

        let notice = Notice::Disconnected {
            reason: reason.to_owned(),
        };
        for (session, queue) in &sessions {
            if let Err(error) = queue.try_send(notice.clone()) {
                warn!(
                    target: CONNECTION_TARGET,
                    %session,
                    error = %error,
                    "could not deliver disconnect notice"
                );
            }
        }
        info!(
            target: CONNECTION_TARGET,
            authority = %authority.name,
            sessions = sessions.len(),
            reason,
            "authority detached"
        );
        Ok(sessions.len())
    }

    pub(crate) fn attach_session(
        &self,
        capacity: usize,
    ) -> Result<(SessionId, Receiver<Notice>), RtiError> {
        let mut state = self.lock()?;
        if state.authority.is_none() {
            return Err(RtiError::internal(
                "cannot attach a session: no authority is attached",
            ));
        }
        let id = self.session_ids.next();
        let (sender, receiver) = bounded(capacity);
        state.sessions.insert(id, sender);
        debug!(target: CONNECTION_TARGET, session = %id, "session attached");
        Ok((id, receiver))
    }

    pub(crate) fn detach_session(&self, id: SessionId) -> Result<bool, RtiError> {
        let removed = self.lock()?.sessions.remove(&id).is_some();
        debug!(target: CONNECTION_TARGET, session = %id, removed, "session detached");
        Ok(removed)
    }

    /// Hands a control request to the authority and waits for its response.
    ///
    /// `timeout` bounds the whole exchange, queueing included.
    pub(crate) fn submit(
        &self,
        origin: SessionId,
        mut context: MessageContext,
        timeout: Duration,
    ) -> Result<MessageContext, RtiError> {
        let deadline = Instant::now() + timeout;
        context.message_mut().set_origin(origin);
        let request = RequestId(self.request_ids.fetch_add(1, Ordering::SeqCst) + 1);
        let (reply, replies) = bounded(1);

        let inbox = {
            let mut state = self.lock()?;
            if !state.sessions.contains_key(&origin) {
                return Err(RtiError::internal(format!(
                    "session {origin} is not attached"
                )));
            }
            let Some(authority) = &state.authority else {
                return Err(RtiError::internal("no authority is attached"));
            };
            let inbox = authority.inbox.clone();
            state.pending.insert(request, reply);
            inbox
        };

        let queued = Inbound::Control { request, context };
        match inbox.send_deadline(queued, deadline) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                self.abandon(request);
                return Err(RtiError::Timeout { waited: timeout });
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                self.abandon(request);
                return Err(RtiError::internal("authority inbox is closed"));
            }
        }
        drop(inbox);

        match replies.recv_deadline(deadline) {
            Ok(resolved) => Ok(resolved),
            Err(RecvTimeoutError::Timeout) => {
                self.abandon(request);
                warn!(
                    target: CONNECTION_TARGET,
                    session = %origin,
                    %request,
                    timeout_ms = timeout.as_millis(),
                    "control request timed out"
                );
                Err(RtiError::Timeout { waited: timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(RtiError::internal(
                "authority detached before responding",
            )),
        }
    }

    fn abandon(&self, request: RequestId) {
        if let Ok(mut state) = self.lock() {
            state.pending.remove(&request);
        }
    }

    /// Completes a pending request without blocking.
    pub(crate) fn complete(&self, response: ControlResponse) -> Result<(), RtiError> {
        let ControlResponse { request, context } = response;
        let Some(reply) = self.lock()?.pending.remove(&request) else {
            return Err(RtiError::internal(format!(
                "no pending control request {request}"
            )));
        };
        if let Err(TrySendError::Disconnected(_) | TrySendError::Full(_)) = reply.try_send(context)
        {
            debug!(target: CONNECTION_TARGET, %request, "caller stopped waiting");
        }
        Ok(())
    }

    /// Queues a session-originated broadcast for the authority.
    pub(crate) fn forward_broadcast(
        &self,
        origin: SessionId,
        broadcast: Broadcast,
    ) -> Result<(), RtiError> {
        let inbox = {
            let state = self.lock()?;
            let Some(authority) = &state.authority else {
                return Err(RtiError::internal("no authority is attached"));
            };
            authority.inbox.clone()
        };
        match inbox.try_send(Inbound::Broadcast(broadcast)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(
                    target: CONNECTION_TARGET,
                    session = %origin,
                    "authority inbox full; broadcast dropped"
                );
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(RtiError::internal("authority inbox is closed"))
            }
        }
    }

    /// Enqueues `notice` for each session without blocking. Returns how many
    /// sessions accepted it.
    pub(crate) fn deliver(&self, sessions: &[SessionId], notice: &Notice) -> usize {
        let queues: Vec<(SessionId, Option<Sender<Notice>>)> = match self.lock() {
            Ok(state) => sessions
                .iter()
                .map(|id| (*id, state.sessions.get(id).cloned()))
                .collect(),
            Err(error) => {
                warn!(target: CONNECTION_TARGET, error = %error, "broadcast dropped");
                return 0;
            }
        };

        let mut delivered = 0;
        for (session, queue) in queues {
            let Some(queue) = queue else {
                warn!(target: CONNECTION_TARGET, %session, "recipient session is gone");
                continue;
            };
            match queue.try_send(notice.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(target: CONNECTION_TARGET, %session, "notice queue full; notice dropped");
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!(target: CONNECTION_TARGET, %session, "recipient stopped listening");
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("has_authority", &self.has_authority())
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::error::ErrorKind;
    use crate::handles::FederationHandle;
    use crate::messaging::{ControlMessage, Payload, Request};
    use rstest::{fixture, rstest};

    const TIMEOUT: Duration = Duration::from_secs(2);

    struct Attached {
        exchange: Exchange,
        inbox: Receiver<Inbound>,
    }

    #[fixture]
    fn attached() -> Attached {
        let exchange = Exchange::new();
        let (sender, inbox) = bounded(8);
        exchange
            .attach_authority("primary", sender)
            .expect("attach authority");
        Attached { exchange, inbox }
    }

    fn ping() -> MessageContext {
        MessageContext::new(ControlMessage::new(Request::Ping))
    }

    #[test]
    fn session_cannot_attach_without_authority() {
        let exchange = Exchange::new();
        let error = exchange.attach_session(4).expect_err("no authority");
        assert_eq!(error.kind(), ErrorKind::Internal);
    }

    #[rstest]
    fn second_authority_is_refused(attached: Attached) {
        let (sender, _inbox) = bounded(1);
        let error = attached
            .exchange
            .attach_authority("secondary", sender)
            .expect_err("second authority");
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert!(attached.exchange.has_authority());
    }

    #[rstest]
    fn detaching_authority_notifies_every_session(attached: Attached) {
        let (_, first) = attached.exchange.attach_session(4).expect("first");
        let (_, second) = attached.exchange.attach_session(4).expect("second");

        let count = attached
            .exchange
            .detach_authority("maintenance")
            .expect("detach");

        assert_eq!(count, 2);
        let expected = Notice::Disconnected {
            reason: "maintenance".into(),
        };
        assert_eq!(first.try_recv().ok(), Some(expected.clone()));
        assert_eq!(second.try_recv().ok(), Some(expected));
        assert_eq!(attached.exchange.session_count(), 0);
        assert!(!attached.exchange.has_authority());
    }

    #[rstest]
    fn submit_round_trips_through_the_inbox(attached: Attached) {
        let Attached { exchange, inbox } = attached;
        let exchange = std::sync::Arc::new(exchange);
        let (session, _notices) = exchange.attach_session(4).expect("session");

        let responder = {
            let exchange = std::sync::Arc::clone(&exchange);
            thread::spawn(move || {
                let Ok(Inbound::Control {
                    request,
                    mut context,
                }) = inbox.recv()
                else {
                    panic!("expected a control request");
                };
                assert_eq!(context.message().origin(), Some(session));
                context.success(Payload::Pong { server_time_ms: 42 });
                exchange
                    .complete(ControlResponse::new(request, context))
                    .expect("complete");
            })
        };

        let resolved = exchange.submit(session, ping(), TIMEOUT).expect("submit");
        responder.join().expect("responder panicked");
        assert_eq!(
            resolved.into_result(),
            Ok(Payload::Pong { server_time_ms: 42 })
        );
    }

    #[rstest]
    fn unanswered_request_times_out(attached: Attached) {
        let (session, _notices) = attached.exchange.attach_session(4).expect("session");
        let waited = Duration::from_millis(20);

        let error = attached
            .exchange
            .submit(session, ping(), waited)
            .expect_err("no responder");

        assert_eq!(error, RtiError::Timeout { waited });
        assert!(attached.inbox.try_recv().is_ok(), "request was queued");
    }

    #[rstest]
    fn delivery_skips_full_and_missing_queues(attached: Attached) {
        let (roomy, roomy_rx) = attached.exchange.attach_session(4).expect("roomy");
        let (cramped, _cramped_rx) = attached.exchange.attach_session(1).expect("cramped");
        let notice = Notice::FederationSynchronized {
            federation: FederationHandle::new(1),
            label: "READY".into(),
        };
        assert_eq!(attached.exchange.deliver(&[cramped], &notice), 1);

        let delivered = attached
            .exchange
            .deliver(&[roomy, cramped, SessionId::new(99)], &notice);

        assert_eq!(delivered, 1);
        assert_eq!(roomy_rx.try_recv().ok(), Some(notice));
    }

    #[rstest]
    fn completing_an_unknown_request_is_internal(attached: Attached) {
        let error = attached
            .exchange
            .complete(ControlResponse::new(RequestId(77), ping()))
            .expect_err("unknown request");
        assert_eq!(error.kind(), ErrorKind::Internal);
    }
}
