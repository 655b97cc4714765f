//! Authority-side handlers for federation-scoped requests.

use tracing::debug;

use super::{FEDERATION_TARGET, FederationScope};
use crate::error::RtiError;
use crate::messaging::{
    Configured, HandlerFactory, MessageContext, MessageHandler, MessageType, Payload, Request,
};
use crate::sync::{AchieveSyncPointHandler, RegisterSyncPointHandler};

/// Handler table for every federation's incoming sink.
pub(crate) const INCOMING: &[(MessageType, HandlerFactory<FederationScope>)] = &[
    (MessageType::JoinFederation, JoinFederationHandler::boxed),
    (MessageType::ResignFederation, ResignFederationHandler::boxed),
    (MessageType::RegisterSyncPoint, RegisterSyncPointHandler::boxed),
    (MessageType::AchieveSyncPoint, AchieveSyncPointHandler::boxed),
];

/// Admits a federate and tells it about open federation-wide points.
#[derive(Default)]
pub(crate) struct JoinFederationHandler {
    scope: Configured<FederationScope>,
}

impl JoinFederationHandler {
    fn boxed() -> Box<dyn MessageHandler<FederationScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<FederationScope> for JoinFederationHandler {
    fn name(&self) -> &'static str {
        "join-federation"
    }

    fn configure(&mut self, shared: &FederationScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let federation = scope.federation()?;
        let Request::JoinFederation { federate, .. } = context.request() else {
            return Err(RtiError::unexpected_request(
                self.name(),
                context.message().message_type(),
            ));
        };
        if federate.is_empty() {
            return Err(RtiError::internal("federate name must not be empty"));
        }

        let federate = federate.clone();
        let (handle, owed) = federation.join(&federate, context.message().origin())?;
        context.success(Payload::Joined {
            federate: handle,
            federation: federation.handle(),
        });
        scope.deliver(federation.handle(), owed);
        Ok(())
    }
}

/// Removes a federate and completes any barrier it was holding up.
#[derive(Default)]
pub(crate) struct ResignFederationHandler {
    scope: Configured<FederationScope>,
}

impl ResignFederationHandler {
    fn boxed() -> Box<dyn MessageHandler<FederationScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<FederationScope> for ResignFederationHandler {
    fn name(&self) -> &'static str {
        "resign-federation"
    }

    fn configure(&mut self, shared: &FederationScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let federation = scope.federation()?;
        let Request::ResignFederation { federate, .. } = context.request() else {
            return Err(RtiError::unexpected_request(
                self.name(),
                context.message().message_type(),
            ));
        };

        let deliveries = federation.resign(*federate)?;
        debug!(
            target: FEDERATION_TARGET,
            federation = %federation.name(),
            synchronized = deliveries.len(),
            "resignation processed"
        );
        context.success(Payload::Empty);
        scope.deliver(federation.handle(), deliveries);
        Ok(())
    }
}
