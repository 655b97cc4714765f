//! Integer identities for federations, federates and sessions.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            /// Wraps a raw value.
            #[must_use]
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            #[must_use]
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle_type!(
    /// Process-lifetime identity of a federation.
    FederationHandle(u32)
);
handle_type!(
    /// Identity of a federate within one federation.
    FederateHandle(u32)
);
handle_type!(
    /// Identity of a session attached to an exchange.
    SessionId(u64)
);

/// Monotonic allocator; the first value handed out is 1 and values are never
/// reused.
#[derive(Debug, Default)]
pub(crate) struct HandleCounter(AtomicU32);

impl HandleCounter {
    pub(crate) fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Default)]
pub(crate) struct SessionCounter(AtomicU64);

impl SessionCounter {
    pub(crate) fn next(&self) -> SessionId {
        SessionId(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
