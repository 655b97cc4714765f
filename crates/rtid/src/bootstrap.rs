//! Authority bootstrap orchestration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ortho_config::OrthoError;
use rti_config::{Config, ConfigValidationError};
use thiserror::Error;

use crate::connection::Exchange;
use crate::error::RtiError;
use crate::health::HealthReporter;
use crate::rti::{AUTHORITY_NAME, Authority};
use crate::shutdown::{ShutdownError, ShutdownSignal};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the runtime configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but cannot drive a runtime.
    #[error("invalid configuration: {source}")]
    Validation {
        #[source]
        source: ConfigValidationError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        #[source]
        source: TelemetryError,
    },
    /// The authority could not be attached.
    #[error("failed to start the authority: {source}")]
    Authority {
        #[source]
        source: RtiError,
    },
}

/// A bootstrapped authority together with its reporting collaborators.
pub struct Daemon {
    authority: Authority,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
    stopped: AtomicBool,
}

impl Daemon {
    #[must_use]
    pub fn config(&self) -> &Config {
        self.authority.config()
    }

    #[must_use]
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Detaches the authority, notifying attached sessions. Only the first
    /// call has an effect.
    ///
    /// # Errors
    ///
    /// Fails only when a connection lock is poisoned.
    pub fn shutdown(&self) -> Result<(), RtiError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.authority.shutdown()?;
        self.reporter.authority_detached(AUTHORITY_NAME);
        Ok(())
    }

    /// Serves until `signal` fires, then shuts down.
    ///
    /// # Errors
    ///
    /// Fails when the signal listener cannot be installed or detaching fails.
    pub fn run_until(&self, signal: &dyn ShutdownSignal) -> Result<(), ShutdownError> {
        let waited = signal.wait();
        let detached = self
            .shutdown()
            .map_err(|source| ShutdownError::Detach { source });
        waited.and(detached)
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("authority", &self.authority)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

/// Bootstraps an authority on `exchange` using the supplied collaborators.
///
/// # Errors
///
/// Each failing stage is reported to `reporter` and returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    exchange: &Arc<Exchange>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;
    config
        .validate()
        .map_err(|source| fail(BootstrapError::Validation { source }))?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| fail(BootstrapError::Telemetry { source }))?;
    let authority = Authority::start(config, exchange)
        .map_err(|source| fail(BootstrapError::Authority { source }))?;

    reporter.bootstrap_succeeded(authority.config());
    reporter.authority_attached(AUTHORITY_NAME);
    Ok(Daemon {
        authority,
        telemetry,
        reporter,
        stopped: AtomicBool::new(false),
    })
}
