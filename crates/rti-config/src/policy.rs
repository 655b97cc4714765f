use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Effect of a resignation on synchronization points that are still open.
///
/// Under both policies the resigning federate is dropped from every achieved
/// set. The policies differ only for restricted points that named it.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResignPolicy {
    /// Remove the federate from restricted target sets, so the barrier can
    /// complete with the members that remain.
    #[default]
    Prune,
    /// Keep restricted target sets fixed; a barrier naming a departed
    /// federate can no longer synchronize.
    Retain,
}

/// Errors encountered while parsing a [`ResignPolicy`] from text.
pub type ResignPolicyParseError = strum::ParseError;
