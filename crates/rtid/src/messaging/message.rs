//! Message envelope types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::handles::{FederateHandle, FederationHandle, SessionId};

/// Discriminator used to select a handler in a [`MessageSink`](super::MessageSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    CreateFederation,
    DestroyFederation,
    JoinFederation,
    ResignFederation,
    ListFederations,
    Ping,
    RegisterSyncPoint,
    AchieveSyncPoint,
}

impl MessageType {
    /// Returns `true` when the authority routes this message to a federation's
    /// incoming sink rather than handling it globally.
    #[must_use]
    pub fn is_federation_message(self) -> bool {
        matches!(
            self,
            Self::JoinFederation
                | Self::ResignFederation
                | Self::RegisterSyncPoint
                | Self::AchieveSyncPoint
        )
    }
}

/// Interface-specification version a federation was created for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum HlaVersion {
    #[strum(serialize = "hla13")]
    Hla13,
    #[strum(serialize = "ieee1516")]
    Ieee1516,
    #[default]
    #[strum(serialize = "ieee1516e")]
    Ieee1516e,
}

/// Opaque reference to the object-model modules a federation was created
/// with. Parsing and merging the modules happens elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    modules: Vec<String>,
}

impl SchemaRef {
    /// Builds a reference from module identifiers.
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    /// Module identifiers in load order.
    #[must_use]
    pub fn modules(&self) -> &[String] {
        &self.modules
    }
}

/// Body of a control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateFederation {
        name: String,
        schema: SchemaRef,
        version: HlaVersion,
    },
    DestroyFederation {
        name: String,
    },
    JoinFederation {
        federation: String,
        federate: String,
    },
    ResignFederation {
        federation: String,
        federate: FederateHandle,
    },
    ListFederations,
    Ping,
    RegisterSyncPoint {
        label: String,
        tag: Vec<u8>,
        /// An empty set means federation-wide.
        targets: BTreeSet<FederateHandle>,
    },
    AchieveSyncPoint {
        label: String,
    },
}

impl Request {
    /// Discriminator of this request.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CreateFederation { .. } => MessageType::CreateFederation,
            Self::DestroyFederation { .. } => MessageType::DestroyFederation,
            Self::JoinFederation { .. } => MessageType::JoinFederation,
            Self::ResignFederation { .. } => MessageType::ResignFederation,
            Self::ListFederations => MessageType::ListFederations,
            Self::Ping => MessageType::Ping,
            Self::RegisterSyncPoint { .. } => MessageType::RegisterSyncPoint,
            Self::AchieveSyncPoint { .. } => MessageType::AchieveSyncPoint,
        }
    }
}

/// A request plus routing header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    source_federate: Option<FederateHandle>,
    target_federation: Option<FederationHandle>,
    origin: Option<SessionId>,
    request: Request,
}

impl ControlMessage {
    /// Wraps a request with an empty header.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            source_federate: None,
            target_federation: None,
            origin: None,
            request,
        }
    }

    /// Stamps the sending federate and the federation it addresses.
    #[must_use]
    pub fn from_federate(mut self, federate: FederateHandle, federation: FederationHandle) -> Self {
        self.set_source(federate, federation);
        self
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.request.message_type()
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn source_federate(&self) -> Option<FederateHandle> {
        self.source_federate
    }

    #[must_use]
    pub fn target_federation(&self) -> Option<FederationHandle> {
        self.target_federation
    }

    /// Session the exchange received this message from.
    #[must_use]
    pub fn origin(&self) -> Option<SessionId> {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: SessionId) {
        self.origin = Some(origin);
    }

    pub(crate) fn set_source(&mut self, federate: FederateHandle, federation: FederationHandle) {
        self.source_federate = Some(federate);
        self.target_federation = Some(federation);
    }
}

/// Point-in-time description of a federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSummary {
    pub name: String,
    pub handle: FederationHandle,
    pub federate_count: usize,
    pub version: HlaVersion,
}

/// Success value of a resolved control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    FederationCreated {
        federation: FederationHandle,
    },
    Joined {
        federate: FederateHandle,
        federation: FederationHandle,
    },
    Federations(Vec<FederationSummary>),
    Pong {
        /// Authority wall-clock time in milliseconds since the Unix epoch.
        server_time_ms: u128,
    },
}

/// Unsolicited notification delivered to sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A synchronization point naming the recipient was registered.
    SyncPointAnnounced {
        federation: FederationHandle,
        label: String,
        tag: Vec<u8>,
    },
    /// Every federate in the point's scope has achieved it.
    FederationSynchronized {
        federation: FederationHandle,
        label: String,
    },
    /// Payload broadcast by another federate of the same federation.
    Reflected {
        federation: FederationHandle,
        sender: FederateHandle,
        payload: Vec<u8>,
    },
    /// The authority went away; the session is no longer attached.
    Disconnected { reason: String },
}

/// Who a broadcast goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every session attached to the federation except the sender's. Resolved
    /// by the authority.
    Federation,
    /// Exactly these sessions.
    Sessions(Vec<SessionId>),
}

/// Fire-and-forget fan-out message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub federation: FederationHandle,
    pub sender: Option<FederateHandle>,
    pub audience: Audience,
    pub notice: Notice,
}

impl Broadcast {
    /// Broadcast addressed to explicit sessions.
    #[must_use]
    pub fn to_sessions(
        federation: FederationHandle,
        sessions: Vec<SessionId>,
        notice: Notice,
    ) -> Self {
        Self {
            federation,
            sender: None,
            audience: Audience::Sessions(sessions),
            notice,
        }
    }

    /// Broadcast from a federate to the rest of its federation.
    #[must_use]
    pub fn to_federation(
        federation: FederationHandle,
        sender: FederateHandle,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            federation,
            sender: Some(sender),
            audience: Audience::Federation,
            notice: Notice::Reflected {
                federation,
                sender,
                payload,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Request::JoinFederation { federation: "F".into(), federate: "a".into() }, true)]
    #[case(Request::ResignFederation { federation: "F".into(), federate: FederateHandle::new(1) }, true)]
    #[case(Request::AchieveSyncPoint { label: "L".into() }, true)]
    #[case(Request::CreateFederation { name: "F".into(), schema: SchemaRef::default(), version: HlaVersion::default() }, false)]
    #[case(Request::ListFederations, false)]
    #[case(Request::Ping, false)]
    fn classifies_federation_scoped_requests(#[case] request: Request, #[case] scoped: bool) {
        assert_eq!(request.message_type().is_federation_message(), scoped);
    }

    #[test]
    fn header_stamping_keeps_the_request() {
        let message = ControlMessage::new(Request::AchieveSyncPoint {
            label: "READY".into(),
        })
        .from_federate(FederateHandle::new(2), FederationHandle::new(1));

        assert_eq!(message.source_federate(), Some(FederateHandle::new(2)));
        assert_eq!(message.target_federation(), Some(FederationHandle::new(1)));
        assert_eq!(message.message_type(), MessageType::AchieveSyncPoint);
        assert_eq!(message.origin(), None);
    }

    #[test]
    fn versions_parse_case_insensitively() {
        assert_eq!("IEEE1516E".parse::<HlaVersion>().ok(), Some(HlaVersion::Ieee1516e));
        assert_eq!(HlaVersion::Hla13.to_string(), "hla13");
    }
}
