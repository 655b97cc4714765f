//! The coordination authority.
//!
//! An [`Authority`] owns the federation registry and the authority side of a
//! connection. Inbound control requests are routed by message type: registry
//! operations go to the authority's own sink, while join, resign and
//! synchronization requests go to the incoming sink of the federation they
//! address.

mod handlers;
mod inbox;

use std::sync::Arc;

use rti_config::Config;
use tracing::{info, warn};

use crate::connection::{AuthorityJvmConnection, Connection, Exchange, authority_connection};
use crate::error::RtiError;
use crate::federation::FederationRegistry;

use inbox::RtiInbox;

pub(crate) const AUTHORITY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::authority");

/// Name the authority attaches to an exchange under.
pub const AUTHORITY_NAME: &str = "rti";

/// What authority-wide handlers are wired against.
#[derive(Clone)]
pub(crate) struct AuthorityScope {
    pub(crate) registry: Arc<FederationRegistry>,
}

/// A running coordination authority.
///
/// Dropping the authority detaches it, which notifies every attached
/// session with [`crate::messaging::Notice::Disconnected`].
pub struct Authority {
    config: Config,
    connection: Arc<AuthorityJvmConnection>,
    registry: Arc<FederationRegistry>,
}

impl Authority {
    /// Wires the registry and inbox, then attaches to `exchange`.
    ///
    /// # Errors
    ///
    /// [`RtiError::Configuration`] for an unsupported connection type and
    /// [`RtiError::Internal`] when another authority is already attached.
    pub fn start(config: Config, exchange: &Arc<Exchange>) -> Result<Self, RtiError> {
        let connection = authority_connection(AUTHORITY_NAME, &config, exchange)?;
        let shared: Arc<dyn Connection> = Arc::clone(&connection) as Arc<dyn Connection>;
        let registry = Arc::new(FederationRegistry::new(
            Arc::clone(&shared),
            config.resign_policy(),
        ));
        let inbox = RtiInbox::new(Arc::clone(&registry), shared)?;
        connection.bind_inbox(Arc::new(inbox))?;
        if let Err(error) = connection.connect() {
            // Unbinds the inbox so the registry and connection can be freed.
            if let Err(cleanup) = connection.disconnect() {
                warn!(
                    target: AUTHORITY_TARGET,
                    error = %cleanup,
                    "cleanup after failed attach did not complete"
                );
            }
            return Err(error);
        }

        info!(
            target: AUTHORITY_TARGET,
            authority = AUTHORITY_NAME,
            connection = %config.connection(),
            resign_policy = %config.resign_policy(),
            "authority attached"
        );
        Ok(Self {
            config,
            connection,
            registry,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<FederationRegistry> {
        &self.registry
    }

    /// The exchange this authority is attached to.
    #[must_use]
    pub fn exchange(&self) -> &Arc<Exchange> {
        self.connection.exchange()
    }

    /// Detaches from the exchange. Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Fails only when a connection lock is poisoned.
    pub fn shutdown(&self) -> Result<(), RtiError> {
        if !self.connection.is_connected() {
            return Ok(());
        }
        self.connection.disconnect()?;
        info!(target: AUTHORITY_TARGET, authority = AUTHORITY_NAME, "authority detached");
        Ok(())
    }
}

impl Drop for Authority {
    fn drop(&mut self) {
        if let Err(error) = self.connection.disconnect() {
            warn!(target: AUTHORITY_TARGET, error = %error, "detach on drop failed");
        }
    }
}

impl std::fmt::Debug for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("connection", &self.config.connection())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
