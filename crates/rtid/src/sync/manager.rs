use std::collections::{BTreeMap, BTreeSet};

use rti_config::ResignPolicy;
use tracing::debug;

use super::{SYNC_TARGET, SyncPoint, SyncScope};
use crate::error::RtiError;
use crate::handles::FederateHandle;

/// Notification produced by a state change, addressed by federate handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Announced {
        label: String,
        tag: Vec<u8>,
        recipients: BTreeSet<FederateHandle>,
    },
    Synchronized {
        label: String,
        recipients: BTreeSet<FederateHandle>,
    },
}

/// Serialised point table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot(Vec<u8>);

impl SyncSnapshot {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Owns every synchronization point of one federation.
///
/// Callers pass the set of currently joined federates into each operation;
/// the manager never sees the federate table itself. Operations return the
/// notifications to deliver instead of delivering them.
#[derive(Debug, Default)]
pub struct SyncPointManager {
    points: BTreeMap<String, SyncPoint>,
    restoring: bool,
}

impl SyncPointManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new point and announces it to its scope.
    ///
    /// Nothing is stored unless every check passes.
    ///
    /// # Errors
    ///
    /// Internal error for an empty label, [`RtiError::InvalidSyncSet`] when a
    /// target is not joined and [`RtiError::SyncPointAlreadyExists`] for a
    /// duplicate label.
    pub fn register(
        &mut self,
        label: &str,
        tag: Vec<u8>,
        targets: BTreeSet<FederateHandle>,
        registrant: FederateHandle,
        joined: &BTreeSet<FederateHandle>,
    ) -> Result<Vec<SyncEvent>, RtiError> {
        if label.is_empty() {
            return Err(RtiError::internal(
                "synchronization point label must not be empty",
            ));
        }
        let scope = SyncScope::from_targets(targets);
        if let SyncScope::Restricted(targets) = &scope
            && let Some(unknown) = targets.iter().find(|handle| !joined.contains(handle))
        {
            return Err(RtiError::InvalidSyncSet {
                label: label.to_owned(),
                handle: *unknown,
            });
        }
        if self.points.contains_key(label) {
            return Err(RtiError::SyncPointAlreadyExists {
                label: label.to_owned(),
            });
        }

        let recipients = scope.members(joined);
        debug!(
            target: SYNC_TARGET,
            label,
            %registrant,
            federation_wide = scope.is_federation_wide(),
            "synchronization point registered"
        );
        self.points.insert(
            label.to_owned(),
            SyncPoint::new(label.to_owned(), tag.clone(), scope, registrant),
        );
        Ok(self.emit(vec![SyncEvent::Announced {
            label: label.to_owned(),
            tag,
            recipients,
        }]))
    }

    /// Records that `handle` reached `label`.
    ///
    /// Achieving twice is a no-op. Returns the synchronized notification when
    /// this achievement completed the barrier.
    ///
    /// # Errors
    ///
    /// [`RtiError::SyncPointDoesNotExist`] for an unknown label and
    /// [`RtiError::NotInSyncSet`] when a restricted point does not name
    /// `handle`.
    pub fn achieve(
        &mut self,
        label: &str,
        handle: FederateHandle,
        joined: &BTreeSet<FederateHandle>,
    ) -> Result<Vec<SyncEvent>, RtiError> {
        let point = self
            .points
            .get_mut(label)
            .ok_or_else(|| RtiError::SyncPointDoesNotExist {
                label: label.to_owned(),
            })?;
        if !point.scope().includes(handle) {
            return Err(RtiError::NotInSyncSet {
                label: label.to_owned(),
                handle,
            });
        }
        if !point.achieve(handle) {
            debug!(target: SYNC_TARGET, label, %handle, "already achieved");
        }
        let events = point
            .try_synchronize(joined)
            .map(|recipients| SyncEvent::Synchronized {
                label: label.to_owned(),
                recipients,
            })
            .into_iter()
            .collect();
        Ok(self.emit(events))
    }

    /// Federation-wide points `handle` has already achieved, as label to tag.
    #[must_use]
    pub fn roll_call(&self, handle: FederateHandle) -> BTreeMap<String, Vec<u8>> {
        self.points
            .values()
            .filter(|point| point.scope().is_federation_wide())
            .filter(|point| point.achieved().contains(&handle))
            .map(|point| (point.label().to_owned(), point.tag().to_vec()))
            .collect()
    }

    /// Announcements owed to a federate that joined after registration.
    ///
    /// Only open federation-wide points are owed; a restricted scope was fixed
    /// before the federate existed.
    #[must_use]
    pub fn announcements_for_joiner(&self, handle: FederateHandle) -> Vec<SyncEvent> {
        let events = self
            .points
            .values()
            .filter(|point| point.scope().is_federation_wide() && !point.is_synchronized())
            .map(|point| SyncEvent::Announced {
                label: point.label().to_owned(),
                tag: point.tag().to_vec(),
                recipients: BTreeSet::from([handle]),
            })
            .collect();
        self.emit(events)
    }

    /// Removes a resigned federate from every open point.
    ///
    /// `joined` must already exclude `handle`. Points whose remaining scope is
    /// now fully achieved synchronize. A restricted point pruned down to no
    /// targets is dropped from the table, freeing its label.
    pub fn federate_resigned(
        &mut self,
        handle: FederateHandle,
        joined: &BTreeSet<FederateHandle>,
        policy: ResignPolicy,
    ) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for point in self.points.values_mut() {
            if point.is_synchronized() {
                continue;
            }
            point.forget(handle, policy);
            if point.has_no_targets() {
                continue;
            }
            if let Some(recipients) = point.try_synchronize(joined) {
                events.push(SyncEvent::Synchronized {
                    label: point.label().to_owned(),
                    recipients,
                });
            }
        }
        self.points.retain(|label, point| {
            if point.has_no_targets() {
                debug!(
                    target: SYNC_TARGET,
                    label = %label,
                    %handle,
                    "restricted point left without targets dropped"
                );
                return false;
            }
            true
        });
        self.emit(events)
    }

    #[must_use]
    pub fn point(&self, label: &str) -> Option<&SyncPoint> {
        self.points.get(label)
    }

    pub fn points(&self) -> impl Iterator<Item = &SyncPoint> {
        self.points.values()
    }

    #[must_use]
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Serialises the point table.
    ///
    /// # Errors
    ///
    /// Internal error when serialisation fails.
    pub fn snapshot(&self) -> Result<SyncSnapshot, RtiError> {
        serde_json::to_vec(&self.points)
            .map(SyncSnapshot)
            .map_err(|error| RtiError::internal(format!("sync snapshot failed: {error}")))
    }

    /// Replaces the point table and enters restore mode, in which no
    /// notifications are produced until [`Self::finish_restore`].
    ///
    /// # Errors
    ///
    /// Internal error when the snapshot cannot be parsed; the current table is
    /// kept in that case.
    pub fn restore(&mut self, snapshot: &SyncSnapshot) -> Result<(), RtiError> {
        let points: BTreeMap<String, SyncPoint> = serde_json::from_slice(snapshot.as_bytes())
            .map_err(|error| RtiError::internal(format!("sync restore failed: {error}")))?;
        debug!(target: SYNC_TARGET, points = points.len(), "restoring synchronization points");
        self.points = points;
        self.restoring = true;
        Ok(())
    }

    /// Leaves restore mode.
    pub fn finish_restore(&mut self) {
        self.restoring = false;
    }

    fn emit(&self, events: Vec<SyncEvent>) -> Vec<SyncEvent> {
        if self.restoring { Vec::new() } else { events }
    }
}
