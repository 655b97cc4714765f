//! Authority-side handlers for registry-wide requests.

use std::time::{SystemTime, UNIX_EPOCH};

use super::AuthorityScope;
use crate::error::RtiError;
use crate::messaging::{
    Configured, HandlerFactory, MessageContext, MessageHandler, MessageType, Payload, Request,
};

/// Handler table for the authority's own sink.
pub(crate) const GLOBAL: &[(MessageType, HandlerFactory<AuthorityScope>)] = &[
    (MessageType::CreateFederation, CreateFederationHandler::boxed),
    (MessageType::DestroyFederation, DestroyFederationHandler::boxed),
    (MessageType::ListFederations, ListFederationsHandler::boxed),
    (MessageType::Ping, PingHandler::boxed),
];

#[derive(Default)]
struct CreateFederationHandler {
    scope: Configured<AuthorityScope>,
}

impl CreateFederationHandler {
    fn boxed() -> Box<dyn MessageHandler<AuthorityScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<AuthorityScope> for CreateFederationHandler {
    fn name(&self) -> &'static str {
        "create-federation"
    }

    fn configure(&mut self, shared: &AuthorityScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let Request::CreateFederation {
            name,
            schema,
            version,
        } = context.request()
        else {
            return Err(RtiError::unexpected_request(
                self.name(),
                context.message().message_type(),
            ));
        };
        if name.is_empty() {
            return Err(RtiError::internal("federation name must not be empty"));
        }

        let federation = scope.registry.create(name, schema.clone(), *version)?;
        context.success(Payload::FederationCreated {
            federation: federation.handle(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct DestroyFederationHandler {
    scope: Configured<AuthorityScope>,
}

impl DestroyFederationHandler {
    fn boxed() -> Box<dyn MessageHandler<AuthorityScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<AuthorityScope> for DestroyFederationHandler {
    fn name(&self) -> &'static str {
        "destroy-federation"
    }

    fn configure(&mut self, shared: &AuthorityScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let Request::DestroyFederation { name } = context.request() else {
            return Err(RtiError::unexpected_request(
                self.name(),
                context.message().message_type(),
            ));
        };

        scope.registry.destroy(name)?;
        context.success(Payload::Empty);
        Ok(())
    }
}

#[derive(Default)]
struct ListFederationsHandler {
    scope: Configured<AuthorityScope>,
}

impl ListFederationsHandler {
    fn boxed() -> Box<dyn MessageHandler<AuthorityScope>> {
        Box::new(Self::default())
    }
}

impl MessageHandler<AuthorityScope> for ListFederationsHandler {
    fn name(&self) -> &'static str {
        "list-federations"
    }

    fn configure(&mut self, shared: &AuthorityScope) -> Result<(), RtiError> {
        self.scope.set(shared);
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let scope = self.scope.get(self.name())?;
        let mut summaries = scope.registry.list()?;
        summaries.sort_by_key(|summary| summary.handle);
        context.success(Payload::Federations(summaries));
        Ok(())
    }
}

/// Liveness echo carrying the authority's wall clock.
#[derive(Default)]
struct PingHandler;

impl PingHandler {
    fn boxed() -> Box<dyn MessageHandler<AuthorityScope>> {
        Box::new(Self)
    }
}

impl MessageHandler<AuthorityScope> for PingHandler {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn configure(&mut self, _shared: &AuthorityScope) -> Result<(), RtiError> {
        Ok(())
    }

    fn process(&self, context: &mut MessageContext) -> Result<(), RtiError> {
        let server_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|error| RtiError::internal(format!("system clock before epoch: {error}")))?
            .as_millis();
        context.success(Payload::Pong { server_time_ms });
        Ok(())
    }
}
