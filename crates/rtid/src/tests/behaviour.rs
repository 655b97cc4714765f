//! Behavioural tests for the authority bootstrap sequence.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use rti_config::ConnectionType;

use crate::bootstrap::BootstrapError;
use crate::rti::AUTHORITY_NAME;

use super::support::{self, HealthEvent, TestWorld};

type StepResult = Result<(), String>;

#[fixture]
fn world() -> RefCell<TestWorld> {
    support::world()
}

#[given("a healthy configuration loader")]
fn given_healthy_loader(world: &RefCell<TestWorld>) {
    world.borrow_mut().use_successful_loader();
}

#[given("a failing configuration loader")]
fn given_failing_loader(world: &RefCell<TestWorld>) {
    world.borrow_mut().use_failing_loader();
}

#[given("a configuration with a zero request timeout")]
fn given_zero_timeout(world: &RefCell<TestWorld>) {
    world.borrow_mut().use_zero_timeout();
}

#[given("a configuration selecting the {connection} connection")]
fn given_connection(world: &RefCell<TestWorld>, connection: String) -> StepResult {
    let raw = connection.trim_matches('"');
    let connection = raw
        .parse::<ConnectionType>()
        .map_err(|error| format!("invalid connection '{raw}': {error}"))?;
    world.borrow_mut().use_connection(connection);
    Ok(())
}

#[when("the authority bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<TestWorld>) {
    world.borrow_mut().bootstrap();
}

#[when("the daemon receives a shutdown signal")]
fn when_shutdown_signal(world: &RefCell<TestWorld>) {
    world.borrow_mut().run_until_signalled();
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(
        world.bootstrap_error().is_none(),
        "bootstrap error: {:?}",
        world.bootstrap_error()
    );
    assert!(world.daemon().is_some(), "daemon should have been created");
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<TestWorld>) {
    assert!(
        world.borrow().bootstrap_error().is_some(),
        "bootstrap succeeded unexpectedly"
    );
}

#[then("bootstrap fails with a validation error")]
fn then_validation_error(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.bootstrap_error(), Some(BootstrapError::Validation { .. })),
        "expected a validation error, got {:?}",
        world.bootstrap_error()
    );
}

#[then("bootstrap fails with an authority error")]
fn then_authority_error(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.bootstrap_error(), Some(BootstrapError::Authority { .. })),
        "expected an authority error, got {:?}",
        world.bootstrap_error()
    );
}

#[then("the daemon stopped cleanly")]
fn then_daemon_stopped(world: &RefCell<TestWorld>) -> StepResult {
    match world.borrow().run_result() {
        Some(Ok(())) => Ok(()),
        Some(Err(error)) => Err(format!("daemon stopped with an error: {error}")),
        None => Err(String::from("daemon never ran")),
    }
}

#[then("the exchange has an authority")]
fn then_exchange_has_authority(world: &RefCell<TestWorld>) {
    assert!(world.borrow().exchange.has_authority());
}

#[then("the exchange has no authority")]
fn then_exchange_has_no_authority(world: &RefCell<TestWorld>) {
    assert!(!world.borrow().exchange.has_authority());
}

#[then("the reporter recorded bootstrap start")]
fn then_reporter_start(world: &RefCell<TestWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapStarting),
        "bootstrap start event missing"
    );
}

#[then("the reporter recorded bootstrap success")]
fn then_reporter_success(world: &RefCell<TestWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapSucceeded),
        "bootstrap success event missing"
    );
}

#[then("the reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<TestWorld>) {
    let events = world.borrow().reporter.events();
    let failed = events
        .iter()
        .any(|event| matches!(event, HealthEvent::BootstrapFailed(_)));
    assert!(failed, "bootstrap failure event missing: {events:?}");
}

#[then("the reporter recorded the authority attaching")]
fn then_reporter_attached(world: &RefCell<TestWorld>) {
    let events = world.borrow().reporter.events();
    assert!(
        events.contains(&HealthEvent::AuthorityAttached(AUTHORITY_NAME.to_owned())),
        "authority attach event missing: {events:?}"
    );
}

#[then("the reporter recorded the authority detaching")]
fn then_reporter_detached(world: &RefCell<TestWorld>) {
    let events = world.borrow().reporter.events();
    let detached = events
        .iter()
        .filter(|event| matches!(event, HealthEvent::AuthorityDetached(_)))
        .count();
    assert_eq!(detached, 1, "expected one detach event: {events:?}");
}

#[scenario(
    path = "tests/features/rti_bootstrap.feature",
    name = "Bootstrap attaches an authority to the exchange"
)]
fn bootstrap_attaches_authority(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/rti_bootstrap.feature",
    name = "Configuration failures are reported"
)]
fn configuration_failures_are_reported(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/rti_bootstrap.feature",
    name = "Invalid configuration values are rejected"
)]
fn invalid_configuration_is_rejected(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/rti_bootstrap.feature",
    name = "Unimplemented connection bindings fail fast"
)]
fn unimplemented_bindings_fail_fast(world: RefCell<TestWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/rti_bootstrap.feature",
    name = "A shutdown signal detaches the authority"
)]
fn shutdown_signal_detaches_authority(world: RefCell<TestWorld>) {
    drop(world);
}
