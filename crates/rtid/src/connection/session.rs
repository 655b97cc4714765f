use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel::Receiver;
use rti_config::ConnectionType;
use tracing::debug;

use super::{CONNECTION_TARGET, Connection, ControlResponse, Exchange};
use crate::error::RtiError;
use crate::handles::SessionId;
use crate::messaging::{Broadcast, MessageContext, Notice};

struct SessionLink {
    id: SessionId,
    notices: Receiver<Notice>,
}

/// Federate side of the in-process binding.
pub struct SessionJvmConnection {
    exchange: Arc<Exchange>,
    timeout: Duration,
    capacity: usize,
    link: Mutex<Option<SessionLink>>,
}

impl SessionJvmConnection {
    pub(crate) fn new(exchange: Arc<Exchange>, timeout: Duration, capacity: usize) -> Self {
        Self {
            exchange,
            timeout,
            capacity,
            link: Mutex::new(None),
        }
    }

    fn link(&self) -> Result<MutexGuard<'_, Option<SessionLink>>, RtiError> {
        self.link.lock().map_err(|_| RtiError::poisoned("session link"))
    }

    fn session_id(&self) -> Result<SessionId, RtiError> {
        self.link()?
            .as_ref()
            .map(|link| link.id)
            .ok_or_else(|| RtiError::internal("session is not connected"))
    }
}

impl Connection for SessionJvmConnection {
    fn name(&self) -> String {
        match self.session_id() {
            Ok(id) => format!("jvm-session-{id}"),
            Err(_) => "jvm-session".to_owned(),
        }
    }

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Jvm
    }

    fn connect(&self) -> Result<(), RtiError> {
        let mut link = self.link()?;
        if let Some(existing) = link.as_ref() {
            return Err(RtiError::internal(format!(
                "session {} is already connected",
                existing.id
            )));
        }
        let (id, notices) = self.exchange.attach_session(self.capacity)?;
        *link = Some(SessionLink { id, notices });
        Ok(())
    }

    fn disconnect(&self) -> Result<(), RtiError> {
        let Some(link) = self.link()?.take() else {
            return Ok(());
        };
        self.exchange.detach_session(link.id)?;
        Ok(())
    }

    fn send_control_request(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let id = self.session_id()?;
        debug!(
            target: CONNECTION_TARGET,
            session = %id,
            message_type = %context.message().message_type(),
            "sending control request"
        );
        let resolved = self.exchange.submit(id, context.clone(), self.timeout)?;
        context.adopt(resolved);
        match context.error_value() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn send_control_response(&self, _response: ControlResponse) -> Result<(), RtiError> {
        Err(RtiError::internal("sessions do not answer control requests"))
    }

    fn send_broadcast(&self, broadcast: Broadcast) -> Result<(), RtiError> {
        let id = self.session_id()?;
        self.exchange.forward_broadcast(id, broadcast)
    }

    fn notices(&self) -> Result<Receiver<Notice>, RtiError> {
        self.link()?
            .as_ref()
            .map(|link| link.notices.clone())
            .ok_or_else(|| RtiError::internal("session is not connected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Inbound;
    use crate::error::ErrorKind;
    use crate::messaging::{ControlMessage, Request};
    use crossbeam_channel::bounded;

    fn exchange_with_silent_authority() -> (Arc<Exchange>, Receiver<Inbound>) {
        let exchange = Arc::new(Exchange::new());
        let (sender, inbox) = bounded(4);
        exchange
            .attach_authority("silent", sender)
            .expect("attach authority");
        (exchange, inbox)
    }

    #[test]
    fn requests_need_a_connection() {
        let (exchange, _inbox) = exchange_with_silent_authority();
        let connection = SessionJvmConnection::new(exchange, Duration::from_millis(10), 4);
        let mut context = MessageContext::new(ControlMessage::new(Request::Ping));

        let error = connection
            .send_control_request(&mut context)
            .expect_err("not connected");
        assert_eq!(error.kind(), ErrorKind::Internal);
    }

    #[test]
    fn silence_becomes_a_timeout() {
        let (exchange, _inbox) = exchange_with_silent_authority();
        let connection = SessionJvmConnection::new(exchange, Duration::from_millis(15), 4);
        connection.connect().expect("connect");
        let mut context = MessageContext::new(ControlMessage::new(Request::Ping));

        let error = connection
            .send_control_request(&mut context)
            .expect_err("silent authority");

        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(!context.is_resolved());
    }

    #[test]
    fn connecting_twice_is_rejected() {
        let (exchange, _inbox) = exchange_with_silent_authority();
        let connection =
            SessionJvmConnection::new(Arc::clone(&exchange), Duration::from_millis(10), 4);
        connection.connect().expect("first");

        assert!(connection.connect().is_err());
        assert_eq!(exchange.session_count(), 1);

        connection.disconnect().expect("disconnect");
        assert_eq!(exchange.session_count(), 0);
    }
}
