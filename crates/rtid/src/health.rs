//! Structured health reporting for authority lifecycle events.

use std::sync::Arc;

use rti_config::Config;

use crate::bootstrap::BootstrapError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the authority is attached to its exchange.
    fn authority_attached(&self, name: &str);

    /// Invoked after the authority detaches.
    fn authority_detached(&self, name: &str);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn authority_attached(&self, name: &str) {
        (**self).authority_attached(name);
    }

    fn authority_detached(&self, name: &str) {
        (**self).authority_detached(name);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "rtid::health",
            event = "bootstrap_starting",
            "starting authority bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "rtid::health",
            event = "bootstrap_succeeded",
            connection = %config.connection(),
            request_timeout_ms = config.request_timeout_ms,
            resign_policy = %config.resign_policy(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "authority bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "rtid::health",
            event = "bootstrap_failed",
            error = %error,
            "authority bootstrap failed"
        );
    }

    fn authority_attached(&self, name: &str) {
        tracing::info!(
            target: "rtid::health",
            event = "authority_attached",
            authority = name,
            "authority ready"
        );
    }

    fn authority_detached(&self, name: &str) {
        tracing::info!(
            target: "rtid::health",
            event = "authority_detached",
            authority = name,
            "authority stopped"
        );
    }
}
