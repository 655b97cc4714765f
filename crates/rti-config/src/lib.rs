//! Shared configuration for the RTI daemon and federate sessions.
//!
//! Both sides of a deployment read the same [`Config`]: the authority uses it
//! to decide which connection binding to attach and how to log, while federate
//! sessions use it for their request timeout and notice queue sizing. Values
//! are layered by `ortho_config` (command line, then `RTI_*` environment
//! variables, then an optional configuration file, then the defaults in
//! [`defaults`]).

mod connection;
pub mod defaults;
mod logging;
mod policy;

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use connection::{ConnectionType, ConnectionTypeParseError};
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::{ResignPolicy, ResignPolicyParseError};

/// Resolved runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "RTI")]
pub struct Config {
    /// Transport binding used to reach the coordination authority.
    #[ortho_config(default = defaults::default_connection_type())]
    pub connection: ConnectionType,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log events.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// How long a session waits for a control response, in milliseconds.
    #[ortho_config(default = defaults::DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    /// Bound on each session's queue of undelivered notices.
    #[ortho_config(default = defaults::DEFAULT_NOTICE_QUEUE_CAPACITY)]
    pub notice_queue_capacity: usize,
    /// What resignation does to restricted synchronization points.
    #[ortho_config(default = defaults::default_resign_policy())]
    pub resign_policy: ResignPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: defaults::default_connection_type(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            request_timeout_ms: defaults::DEFAULT_REQUEST_TIMEOUT_MS,
            notice_queue_capacity: defaults::DEFAULT_NOTICE_QUEUE_CAPACITY,
            resign_policy: defaults::default_resign_policy(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments, environment and files.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when parsing, file reading or
    /// deserialisation fails.
    pub fn load() -> OrthoResult<Self> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration using `args` in place of the process arguments.
    ///
    /// # Errors
    ///
    /// As for [`Config::load`].
    pub fn load_from_iter<I, T>(args: I) -> OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Configured connection binding.
    #[must_use]
    pub fn connection(&self) -> ConnectionType {
        self.connection
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Control request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Capacity of each session's notice queue.
    #[must_use]
    pub fn notice_queue_capacity(&self) -> usize {
        self.notice_queue_capacity
    }

    /// Resignation policy for synchronization points.
    #[must_use]
    pub fn resign_policy(&self) -> ResignPolicy {
        self.resign_policy
    }

    /// Rejects values that load cleanly but cannot drive a runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] for a zero timeout or a zero-capacity
    /// notice queue.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigValidationError::ZeroTimeout);
        }
        if self.notice_queue_capacity == 0 {
            return Err(ConfigValidationError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// Semantic problems detected after loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// `request_timeout_ms` was zero.
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    /// `notice_queue_capacity` was zero.
    #[error("notice queue capacity must be greater than zero")]
    ZeroQueueCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_select_in_process_binding() {
        let config = Config::default();
        assert_eq!(config.connection(), ConnectionType::Jvm);
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.resign_policy(), ResignPolicy::Prune);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(0, 16, ConfigValidationError::ZeroTimeout)]
    #[case(100, 0, ConfigValidationError::ZeroQueueCapacity)]
    fn validate_rejects_unusable_values(
        #[case] timeout: u64,
        #[case] capacity: usize,
        #[case] expected: ConfigValidationError,
    ) {
        let config = Config {
            request_timeout_ms: timeout,
            notice_queue_capacity: capacity,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn load_from_iter_applies_command_line_overrides() {
        let config = Config::load_from_iter(["rtid", "--request-timeout-ms", "250"])
            .expect("command line overrides load");
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.connection(), ConnectionType::Jvm);
    }
}
