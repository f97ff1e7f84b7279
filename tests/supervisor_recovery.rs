//! Supervisor Recovery Tests
//!
//! Tests the connectivity state machine against scripted collaborator
//! failures on a paused clock:
//! - Indefinite link retry at startup
//! - Fixed session retry pacing
//! - Health-triggered recovery after mid-run link loss
//! - Session re-derivation after mid-run session loss
//! - Invalid readings skipping publication


use std::time::Duration;
use test_helpers::{build_supervisor, drive_to_ready};

use distance_agent::supervisor::SupervisorState;
use distance_agent::testing::mocks::{MockBrokerClient, MockLinkDriver, MockSensor};

#[tokio::test(start_paused = true)]
async fn test_link_retry_until_success_has_no_attempt_cap() {
    // Driver that fails three connect calls, then associates.
    let driver = MockLinkDriver::failing_first(3);
    let broker = MockBrokerClient::new();
    let mut supervisor = build_supervisor(driver.clone(), broker, MockSensor::constant(42.0));

    supervisor.step().await.unwrap(); // Booting -> LinkDown
    let state = supervisor.step().await.unwrap(); // retries until the link is up

    assert_eq!(state, SupervisorState::LinkUpSessionDown);
    // Exactly N+1 attempts: the failing three plus the one that succeeded.
    assert_eq!(driver.begin_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_session_retry_attempts_are_spaced_five_seconds() {
    let driver = MockLinkDriver::new();
    // Broker that refuses twice with connect-failed, then accepts.
    let broker = MockBrokerClient::failing_first(2, -2);
    let mut supervisor =
        build_supervisor(driver, broker.clone(), MockSensor::constant(42.0));

    drive_to_ready(&mut supervisor).await;

    let instants = broker.connect_instants().await;
    assert_eq!(instants.len(), 3);
    for pair in instants.windows(2) {
        let spacing = pair[1] - pair[0];
        assert!(
            spacing >= Duration::from_millis(5000),
            "attempts only {spacing:?} apart"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_triggers_recovery_with_no_publish() {
    let driver = MockLinkDriver::new();
    let broker = MockBrokerClient::new();
    let sensor = MockSensor::constant(42.0);
    let mut supervisor =
        build_supervisor(driver.clone(), broker.clone(), sensor.clone());

    drive_to_ready(&mut supervisor).await;
    driver.drop_link();

    // The very next cycle notices and transitions; nothing is sampled or
    // published on the way out.
    let state = supervisor.step().await.unwrap();
    assert_eq!(state, SupervisorState::LinkDown);
    assert!(broker.published().await.is_empty());
    assert_eq!(sensor.measure_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_rederives_session_from_scratch() {
    let driver = MockLinkDriver::new();
    let broker = MockBrokerClient::new();
    let mut supervisor =
        build_supervisor(driver.clone(), broker.clone(), MockSensor::constant(42.0));

    drive_to_ready(&mut supervisor).await;
    assert_eq!(broker.connect_calls(), 1);

    driver.drop_link();
    supervisor.step().await.unwrap(); // Ready -> LinkDown
    drive_to_ready(&mut supervisor).await;

    // A lost link invalidates the session: both sequences ran again.
    assert_eq!(driver.begin_calls(), 2);
    assert_eq!(broker.connect_calls(), 2);

    // Steady state resumes publishing.
    supervisor.step().await.unwrap();
    assert_eq!(broker.published().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_loss_reruns_session_recovery_only() {
    let driver = MockLinkDriver::new();
    let broker = MockBrokerClient::new();
    let mut supervisor =
        build_supervisor(driver.clone(), broker.clone(), MockSensor::constant(42.0));

    drive_to_ready(&mut supervisor).await;
    broker.drop_session(-3);

    let state = supervisor.step().await.unwrap();
    assert_eq!(state, SupervisorState::LinkUpSessionDown);
    assert!(broker.published().await.is_empty());

    // The link never dropped, so only the session sequence runs again.
    drive_to_ready(&mut supervisor).await;
    assert_eq!(driver.begin_calls(), 1);
    assert_eq!(broker.connect_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_reading_skips_publish_and_cycle_continues() {
    let driver = MockLinkDriver::new();
    let broker = MockBrokerClient::new();
    // First measurement fails, the next ones report 42 cm.
    let sensor = MockSensor::scripted(vec![Err("echo timeout".to_string())], 42.0);
    let mut supervisor = build_supervisor(driver, broker.clone(), sensor.clone());

    drive_to_ready(&mut supervisor).await;

    let state = supervisor.step().await.unwrap();
    assert_eq!(state, SupervisorState::Ready);
    assert!(broker.published().await.is_empty(), "invalid reading published");

    supervisor.step().await.unwrap();
    assert_eq!(broker.published().await.len(), 1);
    assert_eq!(sensor.measure_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_measurement_is_not_published() {
    let driver = MockLinkDriver::new();
    let broker = MockBrokerClient::new();
    let sensor = MockSensor::scripted(vec![Ok(f64::NAN), Ok(9000.0)], 42.0);
    let mut supervisor = build_supervisor(driver, broker.clone(), sensor);

    drive_to_ready(&mut supervisor).await;
    supervisor.step().await.unwrap();
    supervisor.step().await.unwrap();
    assert!(broker.published().await.is_empty());

    supervisor.step().await.unwrap();
    assert_eq!(broker.published().await.len(), 1);
}
