use std::collections::BTreeSet;

use rti_config::ResignPolicy;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::handles::FederateHandle;

/// Which federates a synchronization point waits for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Every federate joined now or later.
    FederationWide,
    /// The federates named at registration.
    Restricted(BTreeSet<FederateHandle>),
}

impl SyncScope {
    /// Normalises a registration's target set: no targets means everyone.
    #[must_use]
    pub fn from_targets(targets: BTreeSet<FederateHandle>) -> Self {
        if targets.is_empty() {
            Self::FederationWide
        } else {
            Self::Restricted(targets)
        }
    }

    #[must_use]
    pub fn is_federation_wide(&self) -> bool {
        matches!(self, Self::FederationWide)
    }

    /// Returns `true` when `handle` may achieve a point with this scope.
    #[must_use]
    pub fn includes(&self, handle: FederateHandle) -> bool {
        match self {
            Self::FederationWide => true,
            Self::Restricted(targets) => targets.contains(&handle),
        }
    }

    /// Concrete federates covered, given who is joined right now.
    #[must_use]
    pub fn members(&self, joined: &BTreeSet<FederateHandle>) -> BTreeSet<FederateHandle> {
        match self {
            Self::FederationWide => joined.clone(),
            Self::Restricted(targets) => targets.clone(),
        }
    }
}

/// Externally visible barrier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Announced,
    Synchronized,
}

/// A named barrier inside one federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPoint {
    label: String,
    tag: Vec<u8>,
    scope: SyncScope,
    status: SyncStatus,
    registrant: FederateHandle,
    achieved: BTreeSet<FederateHandle>,
}

impl SyncPoint {
    pub(crate) fn new(
        label: String,
        tag: Vec<u8>,
        scope: SyncScope,
        registrant: FederateHandle,
    ) -> Self {
        Self {
            label,
            tag,
            scope,
            status: SyncStatus::Announced,
            registrant,
            achieved: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    #[must_use]
    pub fn scope(&self) -> &SyncScope {
        &self.scope
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    #[must_use]
    pub fn registrant(&self) -> FederateHandle {
        self.registrant
    }

    #[must_use]
    pub fn achieved(&self) -> &BTreeSet<FederateHandle> {
        &self.achieved
    }

    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.status == SyncStatus::Synchronized
    }

    /// Records an achievement. Returns `false` when it was already recorded.
    pub(crate) fn achieve(&mut self, handle: FederateHandle) -> bool {
        self.achieved.insert(handle)
    }

    /// Moves to [`SyncStatus::Synchronized`] when every member of a non-empty
    /// scope has achieved the point, returning the members to notify.
    pub(crate) fn try_synchronize(
        &mut self,
        joined: &BTreeSet<FederateHandle>,
    ) -> Option<BTreeSet<FederateHandle>> {
        if self.is_synchronized() {
            return None;
        }
        let members = self.scope.members(joined);
        if members.is_empty() || !members.is_subset(&self.achieved) {
            return None;
        }
        self.status = SyncStatus::Synchronized;
        Some(members)
    }

    /// Returns `true` for a restricted point whose target set is empty.
    pub(crate) fn has_no_targets(&self) -> bool {
        matches!(&self.scope, SyncScope::Restricted(targets) if targets.is_empty())
    }

    /// Drops a departed federate from this point's bookkeeping.
    pub(crate) fn forget(&mut self, handle: FederateHandle, policy: ResignPolicy) {
        self.achieved.remove(&handle);
        if let (ResignPolicy::Prune, SyncScope::Restricted(targets)) = (policy, &mut self.scope) {
            targets.remove(&handle);
        }
    }
}
