//! Request/response envelope.

use tracing::{debug, warn};

use super::{ControlMessage, MESSAGING_TARGET, Payload, Request};
use crate::error::RtiError;

/// Outcome slot of a [`MessageContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Pending,
    Success(Payload),
    Error(RtiError),
}

/// Carries one request and at most one response.
///
/// The response moves from [`Response::Pending`] to a success or an error
/// exactly once. Later attempts to resolve the context are ignored.
#[derive(Debug, Clone)]
pub struct MessageContext {
    message: ControlMessage,
    response: Response,
}

impl MessageContext {
    #[must_use]
    pub fn new(message: ControlMessage) -> Self {
        Self {
            message,
            response: Response::Pending,
        }
    }

    #[must_use]
    pub fn message(&self) -> &ControlMessage {
        &self.message
    }

    pub(crate) fn message_mut(&mut self) -> &mut ControlMessage {
        &mut self.message
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        self.message.request()
    }

    /// Resolves the context successfully.
    pub fn success(&mut self, payload: Payload) {
        self.resolve(Response::Success(payload));
    }

    /// Resolves the context with an error.
    pub fn error(&mut self, error: RtiError) {
        self.resolve(Response::Error(error));
    }

    fn resolve(&mut self, response: Response) {
        if self.is_resolved() {
            warn!(
                target: MESSAGING_TARGET,
                message_type = %self.message.message_type(),
                ignored = ?response,
                "context already resolved"
            );
            return;
        }
        self.response = response;
    }

    /// Resolves with an error unless a response is already present.
    pub(crate) fn error_if_pending(&mut self, error: RtiError) {
        if self.is_resolved() {
            debug!(
                target: MESSAGING_TARGET,
                message_type = %self.message.message_type(),
                error = %error,
                "keeping existing response"
            );
            return;
        }
        self.response = Response::Error(error);
    }

    /// Adopts the response of a context resolved elsewhere.
    pub(crate) fn adopt(&mut self, resolved: MessageContext) {
        self.resolve(resolved.response);
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self.response, Response::Pending)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.response, Response::Success(_))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.response, Response::Error(_))
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Returns the error outcome, if any.
    #[must_use]
    pub fn error_value(&self) -> Option<&RtiError> {
        match &self.response {
            Response::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Consumes the context, turning the outcome into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the resolved error, or [`RtiError::Internal`] when the context
    /// was never resolved.
    pub fn into_result(self) -> Result<Payload, RtiError> {
        match self.response {
            Response::Success(payload) => Ok(payload),
            Response::Error(error) => Err(error),
            Response::Pending => Err(RtiError::internal(format!(
                "{} was never resolved",
                self.message.message_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::{fixture, rstest};

    #[fixture]
    fn context() -> MessageContext {
        MessageContext::new(ControlMessage::new(Request::Ping))
    }

    #[rstest]
    fn starts_pending(context: MessageContext) {
        assert!(!context.is_resolved());
        assert_eq!(context.response(), &Response::Pending);
    }

    #[rstest]
    fn first_resolution_wins(mut context: MessageContext) {
        context.success(Payload::Empty);
        context.error(RtiError::internal("late"));

        assert!(context.is_success());
        assert_eq!(context.into_result(), Ok(Payload::Empty));
    }

    #[rstest]
    fn error_if_pending_keeps_existing_error(mut context: MessageContext) {
        context.error(RtiError::FederationDoesNotExist { name: "F".into() });
        context.error_if_pending(RtiError::internal("masking"));

        assert_eq!(
            context.error_value().map(RtiError::kind),
            Some(ErrorKind::DoesNotExist)
        );
    }

    #[rstest]
    fn unresolved_context_becomes_internal_error(context: MessageContext) {
        let error = context.into_result().expect_err("pending context must fail");
        assert_eq!(error.kind(), ErrorKind::Internal);
    }
}
