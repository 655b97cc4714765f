use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, bounded};
use rti_config::ConnectionType;
use tracing::{debug, error, warn};

use super::{CONNECTION_TARGET, Connection, ControlResponse, Exchange, Inbound};
use crate::error::RtiError;
use crate::messaging::{Audience, Broadcast, MessageContext, Notice};

/// Receives what sessions send to the authority.
pub trait InboxHandler: Send + Sync {
    /// Resolves a control request and returns it.
    fn receive_control(&self, context: MessageContext) -> MessageContext;

    /// Handles a session-originated broadcast.
    fn receive_broadcast(&self, broadcast: Broadcast);
}

/// Authority side of the in-process binding.
///
/// Connecting attaches to the [`Exchange`] and starts an inbox thread. Each
/// control request is resolved on its own worker so that a slow federation
/// does not hold up the others.
pub struct AuthorityJvmConnection {
    name: String,
    exchange: Arc<Exchange>,
    capacity: usize,
    inbox: Mutex<Option<Arc<dyn InboxHandler>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AuthorityJvmConnection {
    pub(crate) fn new(name: &str, exchange: Arc<Exchange>, capacity: usize) -> Self {
        Self {
            name: name.to_owned(),
            exchange,
            capacity,
            inbox: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Installs the handler that receives inbound traffic. Must be called
    /// before [`Connection::connect`].
    pub fn bind_inbox(&self, handler: Arc<dyn InboxHandler>) -> Result<(), RtiError> {
        let mut inbox = self
            .inbox
            .lock()
            .map_err(|_| RtiError::poisoned("authority inbox"))?;
        *inbox = Some(handler);
        Ok(())
    }

    /// Whether the inbox thread is running.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.listener
            .lock()
            .map(|listener| listener.is_some())
            .unwrap_or(false)
    }

    /// The exchange this connection attaches to.
    #[must_use]
    pub fn exchange(&self) -> &Arc<Exchange> {
        &self.exchange
    }
}

impl Connection for AuthorityJvmConnection {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Jvm
    }

    fn connect(&self) -> Result<(), RtiError> {
        let handler = self
            .inbox
            .lock()
            .map_err(|_| RtiError::poisoned("authority inbox"))?
            .clone()
            .ok_or_else(|| RtiError::internal("no inbox handler bound to the authority"))?;
        let mut listener = self
            .listener
            .lock()
            .map_err(|_| RtiError::poisoned("authority listener"))?;
        if listener.is_some() {
            return Err(RtiError::internal(format!(
                "authority [{}] is already connected",
                self.name
            )));
        }

        let (sender, receiver) = bounded(self.capacity);
        self.exchange.attach_authority(&self.name, sender)?;
        let exchange = Arc::clone(&self.exchange);
        let spawned = thread::Builder::new()
            .name("rti-inbox".into())
            .spawn(move || run_inbox(&receiver, &handler, &exchange));
        match spawned {
            Ok(handle) => {
                *listener = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.exchange.detach_authority("inbox thread failed to start")?;
                Err(RtiError::internal(format!(
                    "failed to spawn authority inbox: {source}"
                )))
            }
        }
    }

    fn disconnect(&self) -> Result<(), RtiError> {
        let handle = self
            .listener
            .lock()
            .map_err(|_| RtiError::poisoned("authority listener"))?
            .take();
        if let Some(handle) = handle {
            self.exchange.detach_authority("authority disconnected")?;
            if handle.join().is_err() {
                warn!(target: CONNECTION_TARGET, authority = %self.name, "inbox thread panicked");
            }
        }
        // Federation handlers hold this connection; dropping the handler
        // breaks the reference cycle through the registry.
        self.inbox
            .lock()
            .map_err(|_| RtiError::poisoned("authority inbox"))?
            .take();
        Ok(())
    }

    fn send_control_request(&self, _context: &mut MessageContext) -> Result<(), RtiError> {
        Err(RtiError::internal(
            "the authority does not send control requests",
        ))
    }

    fn send_control_response(&self, response: ControlResponse) -> Result<(), RtiError> {
        self.exchange.complete(response)
    }

    fn send_broadcast(&self, broadcast: Broadcast) -> Result<(), RtiError> {
        let Audience::Sessions(sessions) = &broadcast.audience else {
            return Err(RtiError::internal(
                "authority broadcasts must name their recipient sessions",
            ));
        };
        let delivered = self.exchange.deliver(sessions, &broadcast.notice);
        debug!(
            target: CONNECTION_TARGET,
            federation = %broadcast.federation,
            recipients = sessions.len(),
            delivered,
            "broadcast sent"
        );
        Ok(())
    }

    fn notices(&self) -> Result<Receiver<Notice>, RtiError> {
        Err(RtiError::internal("the authority has no notice queue"))
    }
}

fn run_inbox(
    receiver: &Receiver<Inbound>,
    handler: &Arc<dyn InboxHandler>,
    exchange: &Arc<Exchange>,
) {
    for inbound in receiver {
        match inbound {
            Inbound::Control { request, context } => {
                let handler = Arc::clone(handler);
                let exchange = Arc::clone(exchange);
                let spawned = thread::Builder::new()
                    .name("rti-request".into())
                    .spawn(move || {
                        let resolved = handler.receive_control(context);
                        if let Err(error) =
                            exchange.complete(ControlResponse::new(request, resolved))
                        {
                            debug!(
                                target: CONNECTION_TARGET,
                                %request,
                                error = %error,
                                "response dropped"
                            );
                        }
                    });
                if let Err(source) = spawned {
                    error!(
                        target: CONNECTION_TARGET,
                        %request,
                        error = %source,
                        "failed to spawn request worker"
                    );
                }
            }
            Inbound::Broadcast(broadcast) => handler.receive_broadcast(broadcast),
        }
    }
    debug!(target: CONNECTION_TARGET, "authority inbox closed");
}
