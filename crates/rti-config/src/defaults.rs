use crate::{ConnectionType, LogFormat, ResignPolicy};

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default control request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Default bound on a session's undelivered notices.
pub const DEFAULT_NOTICE_QUEUE_CAPACITY: usize = 1_024;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default connection binding.
pub fn default_connection_type() -> ConnectionType {
    ConnectionType::Jvm
}

/// Default synchronization-point resignation policy.
pub fn default_resign_policy() -> ResignPolicy {
    ResignPolicy::Prune
}
