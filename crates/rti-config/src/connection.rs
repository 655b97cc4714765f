//! Connection binding selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Transport binding used between federate sessions and the authority.
///
/// Only [`ConnectionType::Jvm`], the in-process exchange, is functional. The
/// remaining values are accepted by the loader so that a deployment naming
/// them fails when the connection is configured rather than at first use.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConnectionType {
    /// In-process exchange shared by the authority and its sessions.
    #[default]
    Jvm,
    /// Point-to-point TCP.
    Tcp,
    /// Datagram transport.
    Udp,
    /// IP multicast.
    Multicast,
}

impl ConnectionType {
    /// Returns `true` when a working binding exists for this type.
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Jvm)
    }
}

/// Errors encountered while parsing a [`ConnectionType`] from text.
pub type ConnectionTypeParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("jvm", ConnectionType::Jvm)]
    #[case("JVM", ConnectionType::Jvm)]
    #[case("Tcp", ConnectionType::Tcp)]
    #[case("udp", ConnectionType::Udp)]
    #[case("MULTICAST", ConnectionType::Multicast)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: ConnectionType) {
        assert_eq!(input.parse::<ConnectionType>().ok(), Some(expected));
    }

    #[test]
    fn rejects_unknown_binding() {
        assert!("carrier-pigeon".parse::<ConnectionType>().is_err());
    }

    #[test]
    fn only_in_process_binding_is_supported() {
        assert!(ConnectionType::Jvm.is_supported());
        assert!(!ConnectionType::Tcp.is_supported());
        assert!(!ConnectionType::Udp.is_supported());
        assert!(!ConnectionType::Multicast.is_supported());
    }

    #[test]
    fn displays_snake_case() {
        assert_eq!(ConnectionType::Multicast.to_string(), "multicast");
    }
}
