//! Test harness utilities for the behavioural suites.

mod config_loader;
mod federation_world;
mod reporter;
mod world;

pub use federation_world::{FederationWorld, federation_world};
pub use reporter::HealthEvent;
pub use world::{TestWorld, world};
