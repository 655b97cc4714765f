//! Federate-side handlers for outgoing requests.
//!
//! Each handler validates locally, forwards through the session's connection
//! and folds the authority's answer back into session state. Local validation
//! failures never reach the authority.

use tracing::debug;

use super::{Membership, SESSION_TARGET, SessionScope};
use crate::error::RtiError;
use crate::messaging::{
    Configured, HandlerFactory, MessageContext, MessageHandler, MessageType, Payload, Request,
    Response,
};

/// Handler table for a session's outgoing sink.
pub(crate) const OUTGOING: &[(MessageType, HandlerFactory<SessionScope>)] = &[
    (MessageType::CreateFederation, CreateFederationHandler::boxed),
    (MessageType::DestroyFederation, ForwardHandler::boxed),
    (MessageType::ListFederations, ForwardHandler::boxed),
    (MessageType::Ping, ForwardHandler::boxed),
    (MessageType::JoinFederation, JoinFederationHandler::boxed),
    (MessageType::ResignFederation, ResignFederationHandler::boxed),
    (MessageType::RegisterSyncPoint, SyncPointHandler::boxed),
    (MessageType::AchieveSyncPoint, SyncPointHandler::boxed),
];

/// Forwards requests that need no local validation.
#[derive(Default)]
struct ForwardHandler {
    scope: Configured<SessionScope>,
}

impl ForwardHandler {
    fn boxed() -> Box<dyn MessageHandler<SessionScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<SessionScope> for ForwardHandler {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn configure(&mut self, shared: &SessionScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        self.scope
            .get(self.name())?
            .connection
            .send_control_request(context)
    }
}

#[derive(Default)]
struct CreateFederationHandler {
    scope: Configured<SessionScope>,
}

impl CreateFederationHandler {
    fn boxed() -> Box<dyn MessageHandler<SessionScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<SessionScope> for CreateFederationHandler {
    fn name(&self) -> &'static str {
        "create-federation"
    }

    fn configure(&mut self, shared: &SessionScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        if let Request::CreateFederation { name, .. } = context.request()
            && name.is_empty()
        {
            return Err(RtiError::internal("federation name must not be empty"));
        }
        scope.connection.send_control_request(context)
    }
}

#[derive(Default)]
struct JoinFederationHandler {
    scope: Configured<SessionScope>,
}

impl JoinFederationHandler {
    fn boxed() -> Box<dyn MessageHandler<SessionScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<SessionScope> for JoinFederationHandler {
    fn name(&self) -> &'static str {
        "join-federation"
    }

    fn configure(&mut self, shared: &SessionScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let Request::JoinFederation {
            federation,
            federate,
        } = context.request()
        else {
            return Err(RtiError::unexpected_request(
                self.name(),
                context.message().message_type(),
            ));
        };
        if let Some(current) = scope.state.membership()? {
            return Err(RtiError::AlreadyMember {
                federation: current.federation_name,
                federate: current.federate_name,
            });
        }
        if federation.is_empty() {
            return Err(RtiError::FederationDoesNotExist {
                name: federation.clone(),
            });
        }
        if federate.is_empty() {
            return Err(RtiError::internal("federate name must not be empty"));
        }
        let (federation_name, federate_name) = (federation.clone(), federate.clone());

        scope.connection.send_control_request(context)?;
        let Response::Success(Payload::Joined {
            federate,
            federation,
        }) = context.response()
        else {
            return Err(RtiError::internal(format!(
                "join answered with {:?}",
                context.response()
            )));
        };
        scope.state.set_membership(Some(Membership {
            federation_name,
            federation: *federation,
            federate_name,
            federate: *federate,
        }))
    }
}

#[derive(Default)]
struct ResignFederationHandler {
    scope: Configured<SessionScope>,
}

impl ResignFederationHandler {
    fn boxed() -> Box<dyn MessageHandler<SessionScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<SessionScope> for ResignFederationHandler {
    fn name(&self) -> &'static str {
        "resign-federation"
    }

    fn configure(&mut self, shared: &SessionScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let membership = scope.state.require_membership()?;
        context
            .message_mut()
            .set_source(membership.federate, membership.federation);

        scope.connection.send_control_request(context)?;
        scope.state.set_membership(None)?;
        debug!(
            target: SESSION_TARGET,
            federation = %membership.federation_name,
            federate = %membership.federate_name,
            "membership released"
        );
        Ok(())
    }
}

/// Stamps register and achieve requests with the session's membership.
#[derive(Default)]
struct SyncPointHandler {
    scope: Configured<SessionScope>,
}

impl SyncPointHandler {
    fn boxed() -> Box<dyn MessageHandler<SessionScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<SessionScope> for SyncPointHandler {
    fn name(&self) -> &'static str {
        "sync-point"
    }

    fn configure(&mut self, shared: &SessionScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let membership = scope.state.require_membership()?;
        let label = match context.request() {
            Request::RegisterSyncPoint { label, .. } | Request::AchieveSyncPoint { label } => label,
            _ => {
                return Err(RtiError::unexpected_request(
                    self.name(),
                    context.message().message_type(),
                ));
            }
        };
        if label.is_empty() {
            return Err(RtiError::internal(
                "synchronization point label must not be empty",
            ));
        }

        context
            .message_mut()
            .set_source(membership.federate, membership.federation);
        scope.connection.send_control_request(context)
    }
}
