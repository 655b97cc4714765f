//! Authority-side synchronization point handlers.

use crate::error::RtiError;
use crate::federation::FederationScope;
use crate::handles::FederateHandle;
use crate::messaging::{Configured, MessageContext, MessageHandler, Payload, Request};

fn source_federate(context: &MessageContext) -> Result<FederateHandle, RtiError> {
    context.message().source_federate().ok_or_else(|| {
        RtiError::internal(format!(
            "{} carries no source federate",
            context.message().message_type()
        ))
    })
}

#[derive(Default)]
pub(crate) struct RegisterSyncPointHandler {
    scope: Configured<FederationScope>,
}

impl RegisterSyncPointHandler {
    pub(crate) fn boxed() -> Box<dyn MessageHandler<FederationScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<FederationScope> for RegisterSyncPointHandler {
    fn name(&self) -> &'static str {
        "register-sync-point"
    }

    fn configure(&mut self, shared: &FederationScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let federation = scope.federation()?;
        let registrant = source_federate(context)?;
        let Request::RegisterSyncPoint {
            label,
            tag,
            targets,
        } = context.request()
        else {
            return Err(RtiError::unexpected_request(
                self.name(),
                context.message().message_type(),
            ));
        };

        let deliveries =
            federation.register_sync_point(registrant, label, tag.clone(), targets.clone())?;
        context.success(Payload::Empty);
        scope.deliver(federation.handle(), deliveries);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct AchieveSyncPointHandler {
    scope: Configured<FederationScope>,
}

impl AchieveSyncPointHandler {
    pub(crate) fn boxed() -> Box<dyn MessageHandler<FederationScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<FederationScope> for AchieveSyncPointHandler {
    fn name(&self) -> &'static str {
        "achieve-sync-point"
    }

    fn configure(&mut self, shared: &FederationScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let federation = scope.federation()?;
        let federate = source_federate(context)?;
        let Request::AchieveSyncPoint { label } = context.request() else {
            return Err(RtiError::unexpected_request(
                self.name(),
                context.message().message_type(),
            ));
        };

        let deliveries = federation.achieve_sync_point(federate, label)?;
        context.success(Payload::Empty);
        scope.deliver(federation.handle(), deliveries);
        Ok(())
    }
}
