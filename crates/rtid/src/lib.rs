//! Coordination engine for an HLA run-time infrastructure.
//!
//! Independent simulation processes ("federates") open a [`Session`], join a
//! named federation and coordinate through a single [`Authority`]. The
//! authority owns the [`FederationRegistry`], admits and removes federates and
//! runs the synchronization point barrier protocol. Sessions reach it through
//! a [`Connection`]; the in-process [`Exchange`] is the only functional
//! binding.
//!
//! Two message classes travel over a connection. Control messages are
//! blocking request/response pairs carried in a [`MessageContext`] and routed
//! through per-role [`MessageSink`]s. Broadcasts are best-effort notices fanned
//! out to sessions and surfaced on each session's callback queue.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rti_config::Config;
//! use rtid::{Authority, Exchange, HlaVersion, SchemaRef, Session};
//!
//! # fn main() -> Result<(), rtid::RtiError> {
//! let exchange = Arc::new(Exchange::new());
//! let _authority = Authority::start(Config::default(), &exchange)?;
//! let session = Session::connect(&Config::default(), &exchange)?;
//!
//! session.create_federation("Fleet", SchemaRef::new(["fleet.xml"]), HlaVersion::Ieee1516e)?;
//! let (federate, _federation) = session.join_federation("Fleet", "tug-1")?;
//! assert_eq!(federate.get(), 1);
//! # Ok(())
//! # }
//! ```

mod bootstrap;
pub mod connection;
mod error;
pub mod federation;
mod handles;
mod health;
pub mod messaging;
mod rti;
mod session;
mod shutdown;
pub mod sync;
pub mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use connection::{Connection, Exchange};
pub use error::{ErrorKind, RtiError};
pub use federation::{Federate, Federation, FederationRegistry};
pub use handles::{FederateHandle, FederationHandle, SessionId};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use messaging::{
    FederationSummary, HlaVersion, MessageContext, MessageSink, Notice, Payload, Request,
    SchemaRef,
};
pub use rti::{AUTHORITY_NAME, Authority};
pub use session::{CallbackListener, Membership, Session};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use sync::{SyncPoint, SyncScope, SyncStatus};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
