use std::sync::Arc;

use tracing::{debug, warn};

use super::{AUTHORITY_TARGET, AuthorityScope, handlers};
use crate::connection::{Connection, InboxHandler};
use crate::error::RtiError;
use crate::federation::{Federation, FederationRegistry};
use crate::messaging::{Audience, Broadcast, Dispatch, MessageContext, MessageSink, Request};

/// Routes inbound traffic to the authority's global sink or to the incoming
/// sink of the federation a message addresses.
pub(crate) struct RtiInbox {
    registry: Arc<FederationRegistry>,
    global: MessageSink<AuthorityScope>,
    connection: Arc<dyn Connection>,
}

impl RtiInbox {
    pub(crate) fn new(
        registry: Arc<FederationRegistry>,
        connection: Arc<dyn Connection>,
    ) -> Result<Self, RtiError> {
        let scope = AuthorityScope {
            registry: Arc::clone(&registry),
        };
        let global = MessageSink::from_table("authority-global", handlers::GLOBAL, &scope)?;
        Ok(Self {
            registry,
            global,
            connection,
        })
    }

    /// Join and resign name their federation; sync requests carry its handle
    /// in the header.
    fn addressed_federation(&self, context: &MessageContext) -> Result<Arc<Federation>, RtiError> {
        match context.request() {
            Request::JoinFederation { federation, .. }
            | Request::ResignFederation { federation, .. } => self.registry.lookup(federation),
            _ => {
                let handle = context.message().target_federation().ok_or_else(|| {
                    RtiError::internal(format!(
                        "{} carries no target federation",
                        context.message().message_type()
                    ))
                })?;
                self.registry.lookup_handle(handle)
            }
        }
    }

    fn route(&self, context: &mut MessageContext) -> Result<Dispatch, RtiError> {
        if context.message().message_type().is_federation_message() {
            let federation = self.addressed_federation(context)?;
            Ok(federation.incoming()?.process(context))
        } else {
            Ok(self.global.process(context))
        }
    }
}

impl InboxHandler for RtiInbox {
    fn receive_control(&self, mut context: MessageContext) -> MessageContext {
        let message_type = context.message().message_type();
        match self.route(&mut context) {
            Ok(Dispatch::Handled) => {}
            Ok(Dispatch::Unhandled) => context.error_if_pending(RtiError::internal(format!(
                "no authority handler for {message_type}"
            ))),
            Err(error) => context.error_if_pending(error),
        }
        debug!(
            target: AUTHORITY_TARGET,
            %message_type,
            success = context.is_success(),
            "control request resolved"
        );
        context
    }

    fn receive_broadcast(&self, broadcast: Broadcast) {
        let sessions = match &broadcast.audience {
            Audience::Sessions(sessions) => sessions.clone(),
            Audience::Federation => {
                let resolved = self
                    .registry
                    .lookup_handle(broadcast.federation)
                    .and_then(|federation| federation.sessions_except(broadcast.sender));
                match resolved {
                    Ok(sessions) => sessions,
                    Err(error) => {
                        warn!(
                            target: AUTHORITY_TARGET,
                            federation = %broadcast.federation,
                            error = %error,
                            "broadcast dropped"
                        );
                        return;
                    }
                }
            }
        };
        if sessions.is_empty() {
            return;
        }

        let reflected = Broadcast {
            audience: Audience::Sessions(sessions),
            ..broadcast
        };
        if let Err(error) = self.connection.send_broadcast(reflected) {
            warn!(target: AUTHORITY_TARGET, error = %error, "reflection failed");
        }
    }
}
