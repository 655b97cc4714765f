//! Bootstrap world: loader, reporter, exchange and daemon state for steps.

use std::cell::RefCell;
use std::sync::Arc;

use rti_config::{Config, ConnectionType};

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, bootstrap_with};
use crate::connection::Exchange;
use crate::shutdown::ShutdownError;

use super::config_loader::{FailingConfigLoader, ImmediateShutdown, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across bootstrap steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub exchange: Arc<Exchange>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    run_result: Option<Result<(), ShutdownError>>,
}

impl TestWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader),
            reporter: Arc::new(RecordingHealthReporter::default()),
            exchange: Arc::new(Exchange::new()),
            daemon: None,
            bootstrap_error: None,
            run_result: None,
        }
    }

    pub fn use_successful_loader(&mut self) {
        self.use_loader(Box::new(TestConfigLoader));
    }

    pub fn use_failing_loader(&mut self) {
        self.use_loader(Box::new(FailingConfigLoader));
    }

    /// Installs a loader that selects `connection`.
    pub fn use_connection(&mut self, connection: ConnectionType) {
        self.use_loader(Box::new(StaticConfigLoader::new(Config {
            connection,
            ..Config::default()
        })));
    }

    /// Installs a loader whose configuration fails validation.
    pub fn use_zero_timeout(&mut self) {
        self.use_loader(Box::new(StaticConfigLoader::new(Config {
            request_timeout_ms: 0,
            ..Config::default()
        })));
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(&*self.loader, self.reporter.clone(), &self.exchange) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Serves until an immediate shutdown signal fires.
    pub fn run_until_signalled(&mut self) {
        if let Some(daemon) = self.daemon.as_ref() {
            self.run_result = Some(daemon.run_until(&ImmediateShutdown));
        }
    }

    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    #[must_use]
    pub fn daemon(&self) -> Option<&Daemon> {
        self.daemon.as_ref()
    }

    #[must_use]
    pub fn run_result(&self) -> Option<&Result<(), ShutdownError>> {
        self.run_result.as_ref()
    }

    fn use_loader(&mut self, loader: Box<dyn ConfigLoader>) {
        self.loader = loader;
        self.daemon = None;
        self.bootstrap_error = None;
        self.run_result = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default bootstrap world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
