//! Configuration loaders and shutdown signals for bootstrap scenarios.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::OrthoError;
use rti_config::Config;

use crate::bootstrap::ConfigLoader;
use crate::shutdown::{ShutdownError, ShutdownSignal};

/// Loader that yields the default in-process configuration with a short
/// request timeout.
#[derive(Debug, Default)]
pub struct TestConfigLoader;

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            request_timeout_ms: 1_000,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an unknown connection type.
#[derive(Debug, Default)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("rtid"),
            OsString::from("--connection"),
            OsString::from("carrier-pigeon"),
        ];
        Config::load_from_iter(args)
    }
}

/// Signal that fires as soon as it is awaited.
#[derive(Debug, Default)]
pub struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}
