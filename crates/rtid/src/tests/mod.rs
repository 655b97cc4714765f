//! Behavioural suites for the RTI daemon and federate sessions.

mod behaviour;
mod support;
