//! Federations, their federates and the authority-side registry.
//!
//! Each [`Federation`] guards its federate table and synchronization points
//! behind one mutex, so operations on different federations never contend.
//! The [`FederationRegistry`] map has its own lock and is only written by
//! create and destroy.

mod handlers;
mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use once_cell::sync::OnceCell;
use rti_config::ResignPolicy;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::RtiError;
use crate::handles::{FederateHandle, FederationHandle, HandleCounter, SessionId};
use crate::messaging::{Broadcast, FederationSummary, HlaVersion, MessageSink, Notice, SchemaRef};
use crate::sync::{SyncEvent, SyncPoint, SyncPointManager, SyncSnapshot};

pub use registry::FederationRegistry;

pub(crate) const FEDERATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::federation");

/// A session's identity inside one federation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Federate {
    name: String,
    handle: FederateHandle,
    session: Option<SessionId>,
}

impl Federate {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn handle(&self) -> FederateHandle {
        self.handle
    }

    /// Session notices for this federate go to, if any.
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }
}

/// A notice and the sessions it goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) notice: Notice,
    pub(crate) sessions: Vec<SessionId>,
}

#[derive(Debug, Default)]
struct FederationState {
    federates: BTreeMap<FederateHandle, Federate>,
    sync: SyncPointManager,
    destroyed: bool,
}

impl FederationState {
    fn joined(&self) -> BTreeSet<FederateHandle> {
        self.federates.keys().copied().collect()
    }

    fn require_member(&self, handle: FederateHandle, federation: &str) -> Result<(), RtiError> {
        if self.federates.contains_key(&handle) {
            Ok(())
        } else {
            Err(RtiError::FederateNotJoined {
                handle,
                federation: federation.to_owned(),
            })
        }
    }

    fn deliveries(&self, federation: FederationHandle, events: Vec<SyncEvent>) -> Vec<Delivery> {
        events
            .into_iter()
            .map(|event| {
                let (notice, recipients) = match event {
                    SyncEvent::Announced {
                        label,
                        tag,
                        recipients,
                    } => (
                        Notice::SyncPointAnnounced {
                            federation,
                            label,
                            tag,
                        },
                        recipients,
                    ),
                    SyncEvent::Synchronized { label, recipients } => (
                        Notice::FederationSynchronized { federation, label },
                        recipients,
                    ),
                };
                let sessions = recipients
                    .iter()
                    .filter_map(|handle| self.federates.get(handle))
                    .filter_map(Federate::session)
                    .collect();
                Delivery { notice, sessions }
            })
            .collect()
    }
}

/// Unicode-aware case-insensitive comparison of federate names.
fn names_collide(left: &str, right: &str) -> bool {
    left.chars()
        .flat_map(char::to_lowercase)
        .eq(right.chars().flat_map(char::to_lowercase))
}

/// A named coordination domain.
pub struct Federation {
    name: String,
    handle: FederationHandle,
    schema: SchemaRef,
    version: HlaVersion,
    policy: ResignPolicy,
    federate_handles: HandleCounter,
    state: Mutex<FederationState>,
    incoming: OnceCell<MessageSink<FederationScope>>,
}

impl Federation {
    pub(crate) fn new(
        name: &str,
        handle: FederationHandle,
        schema: SchemaRef,
        version: HlaVersion,
        policy: ResignPolicy,
    ) -> Self {
        Self {
            name: name.to_owned(),
            handle,
            schema,
            version,
            policy,
            federate_handles: HandleCounter::default(),
            state: Mutex::new(FederationState::default()),
            incoming: OnceCell::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FederationState>, RtiError> {
        self.state
            .lock()
            .map_err(|_| RtiError::poisoned(&format!("federation [{}]", self.name)))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn handle(&self) -> FederationHandle {
        self.handle
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    #[must_use]
    pub fn version(&self) -> HlaVersion {
        self.version
    }

    #[must_use]
    pub fn resign_policy(&self) -> ResignPolicy {
        self.policy
    }

    /// Admits a federate and returns its handle together with the
    /// announcements owed to it for open federation-wide points.
    ///
    /// # Errors
    ///
    /// [`RtiError::FederateNameInUse`] when another federate's name matches
    /// case-insensitively, [`RtiError::FederationDoesNotExist`] once the
    /// federation has been destroyed.
    pub(crate) fn join(
        &self,
        federate_name: &str,
        session: Option<SessionId>,
    ) -> Result<(FederateHandle, Vec<Delivery>), RtiError> {
        let mut state = self.lock()?;
        if state.destroyed {
            return Err(RtiError::FederationDoesNotExist {
                name: self.name.clone(),
            });
        }
        if state
            .federates
            .values()
            .any(|existing| names_collide(&existing.name, federate_name))
        {
            return Err(RtiError::FederateNameInUse {
                name: federate_name.to_owned(),
                federation: self.name.clone(),
            });
        }

        let handle = FederateHandle::new(self.federate_handles.next());
        state.federates.insert(
            handle,
            Federate {
                name: federate_name.to_owned(),
                handle,
                session,
            },
        );
        let owed = state.sync.announcements_for_joiner(handle);
        info!(
            target: FEDERATION_TARGET,
            federation = %self.name,
            federate = federate_name,
            %handle,
            "federate joined"
        );
        Ok((handle, state.deliveries(self.handle, owed)))
    }

    /// Removes a federate. Removing an absent handle is a no-op.
    pub(crate) fn resign(&self, handle: FederateHandle) -> Result<Vec<Delivery>, RtiError> {
        let mut state = self.lock()?;
        let Some(federate) = state.federates.remove(&handle) else {
            debug!(
                target: FEDERATION_TARGET,
                federation = %self.name,
                %handle,
                "resign for absent federate ignored"
            );
            return Ok(Vec::new());
        };
        let joined = state.joined();
        let events = state.sync.federate_resigned(handle, &joined, self.policy);
        info!(
            target: FEDERATION_TARGET,
            federation = %self.name,
            federate = %federate.name,
            %handle,
            "federate resigned"
        );
        Ok(state.deliveries(self.handle, events))
    }

    /// Registers a synchronization point on behalf of `registrant`.
    pub(crate) fn register_sync_point(
        &self,
        registrant: FederateHandle,
        label: &str,
        tag: Vec<u8>,
        targets: BTreeSet<FederateHandle>,
    ) -> Result<Vec<Delivery>, RtiError> {
        let mut state = self.lock()?;
        state.require_member(registrant, &self.name)?;
        let joined = state.joined();
        let events = state.sync.register(label, tag, targets, registrant, &joined)?;
        Ok(state.deliveries(self.handle, events))
    }

    /// Records that `federate` reached `label`.
    pub(crate) fn achieve_sync_point(
        &self,
        federate: FederateHandle,
        label: &str,
    ) -> Result<Vec<Delivery>, RtiError> {
        let mut state = self.lock()?;
        state.require_member(federate, &self.name)?;
        let joined = state.joined();
        let events = state.sync.achieve(label, federate, &joined)?;
        Ok(state.deliveries(self.handle, events))
    }

    /// Federation-wide points `federate` has already achieved, label to tag.
    ///
    /// # Errors
    ///
    /// Fails only when the federation lock is poisoned.
    pub fn roll_call(
        &self,
        federate: FederateHandle,
    ) -> Result<BTreeMap<String, Vec<u8>>, RtiError> {
        Ok(self.lock()?.sync.roll_call(federate))
    }

    /// Copy of the point registered under `label`.
    ///
    /// # Errors
    ///
    /// Fails only when the federation lock is poisoned.
    pub fn sync_point(&self, label: &str) -> Result<Option<SyncPoint>, RtiError> {
        Ok(self.lock()?.sync.point(label).cloned())
    }

    /// Serialises the synchronization point table.
    ///
    /// # Errors
    ///
    /// Internal error when the lock is poisoned or serialisation fails.
    pub fn save_sync_points(&self) -> Result<SyncSnapshot, RtiError> {
        self.lock()?.sync.snapshot()
    }

    /// Replaces the synchronization point table and suppresses notices until
    /// [`Self::finish_restore`].
    ///
    /// # Errors
    ///
    /// Internal error when the lock is poisoned or the snapshot is corrupt.
    pub fn restore_sync_points(&self, snapshot: &SyncSnapshot) -> Result<(), RtiError> {
        self.lock()?.sync.restore(snapshot)?;
        info!(
            target: FEDERATION_TARGET,
            federation = %self.name,
            "synchronization points restored"
        );
        Ok(())
    }

    /// Resumes notice delivery after a restore.
    ///
    /// # Errors
    ///
    /// Fails only when the federation lock is poisoned.
    pub fn finish_restore(&self) -> Result<(), RtiError> {
        self.lock()?.sync.finish_restore();
        Ok(())
    }

    /// Snapshot of the joined federates ordered by handle.
    ///
    /// # Errors
    ///
    /// Fails only when the federation lock is poisoned.
    pub fn federates(&self) -> Result<Vec<Federate>, RtiError> {
        Ok(self.lock()?.federates.values().cloned().collect())
    }

    /// # Errors
    ///
    /// Fails only when the federation lock is poisoned.
    pub fn contains_federates(&self) -> Result<bool, RtiError> {
        Ok(!self.lock()?.federates.is_empty())
    }

    /// Point-in-time summary for listings.
    ///
    /// # Errors
    ///
    /// Fails only when the federation lock is poisoned.
    pub fn summary(&self) -> Result<FederationSummary, RtiError> {
        Ok(FederationSummary {
            name: self.name.clone(),
            handle: self.handle,
            federate_count: self.lock()?.federates.len(),
            version: self.version,
        })
    }

    /// Sessions of every federate except `sender`.
    pub(crate) fn sessions_except(
        &self,
        sender: Option<FederateHandle>,
    ) -> Result<Vec<SessionId>, RtiError> {
        Ok(self
            .lock()?
            .federates
            .values()
            .filter(|federate| Some(federate.handle) != sender)
            .filter_map(Federate::session)
            .collect())
    }

    /// Marks the federation destroyed so that late joins fail.
    pub(crate) fn retire(&self) -> Result<(), RtiError> {
        let mut state = self.lock()?;
        if !state.federates.is_empty() {
            return Err(RtiError::FederatesCurrentlyJoined {
                name: self.name.clone(),
            });
        }
        state.destroyed = true;
        Ok(())
    }

    pub(crate) fn install_incoming(
        &self,
        sink: MessageSink<FederationScope>,
    ) -> Result<(), RtiError> {
        self.incoming.set(sink).map_err(|_| {
            RtiError::internal(format!(
                "federation [{}] already has an incoming sink",
                self.name
            ))
        })
    }

    pub(crate) fn incoming(&self) -> Result<&MessageSink<FederationScope>, RtiError> {
        self.incoming.get().ok_or_else(|| {
            RtiError::internal(format!(
                "federation [{}] has no incoming sink",
                self.name
            ))
        })
    }
}

impl std::fmt::Debug for Federation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Federation")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// What federation-side handlers are wired against.
#[derive(Clone)]
pub(crate) struct FederationScope {
    federation: Weak<Federation>,
    connection: Arc<dyn Connection>,
}

impl FederationScope {
    pub(crate) fn new(federation: &Arc<Federation>, connection: Arc<dyn Connection>) -> Self {
        Self {
            federation: Arc::downgrade(federation),
            connection,
        }
    }

    pub(crate) fn federation(&self) -> Result<Arc<Federation>, RtiError> {
        self.federation
            .upgrade()
            .ok_or_else(|| RtiError::internal("federation no longer exists"))
    }

    /// Sends each delivery as a broadcast. Failures are logged only.
    pub(crate) fn deliver(&self, federation: FederationHandle, deliveries: Vec<Delivery>) {
        for Delivery { notice, sessions } in deliveries {
            if sessions.is_empty() {
                continue;
            }
            let broadcast = Broadcast::to_sessions(federation, sessions, notice);
            if let Err(error) = self.connection.send_broadcast(broadcast) {
                warn!(
                    target: FEDERATION_TARGET,
                    %federation,
                    error = %error,
                    "broadcast failed"
                );
            }
        }
    }
}
