//! Synchronization point barrier protocol.
//!
//! A point is registered by one federate for either the whole federation or a
//! fixed set of federates. It is announced to that scope, collects
//! achievements, and is synchronized the moment every federate in the scope
//! has achieved it.

mod handlers;
mod manager;
mod point;

pub(crate) use handlers::{AchieveSyncPointHandler, RegisterSyncPointHandler};
pub use manager::{SyncEvent, SyncPointManager, SyncSnapshot};
pub use point::{SyncPoint, SyncScope, SyncStatus};

pub(crate) const SYNC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::sync");
