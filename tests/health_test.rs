//! Health state transitions as seen by subscribers.

use std::time::Duration;

use njall::health::{HealthReporter, HealthState};
use njall::services;

#[tokio::test]
async fn subscribers_see_ready_then_stopping() {
    let health = HealthReporter::new();
    let mut rx = health.subscribe();
    assert_eq!(*rx.borrow_and_update(), HealthState::NotReady);

    let table = services::default_routes(8080).build().unwrap();
    health.route_table_built(&table);
    assert!(!rx.has_changed().unwrap(), "routes alone must not promote");

    health.config_loaded();
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*rx.borrow_and_update(), HealthState::Ready);

    health.stopping();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), HealthState::Stopping);
    assert!(!health.is_live());
}

#[tokio::test]
async fn repeated_signals_do_not_notify() {
    let health = HealthReporter::new();
    let table = services::default_routes(8080).build().unwrap();
    health.config_loaded();
    health.route_table_built(&table);

    let mut rx = health.subscribe();
    rx.borrow_and_update();
    health.config_loaded();
    health.route_table_built(&table);
    assert!(!rx.has_changed().unwrap());

    health.stopping();
    rx.borrow_and_update();
    health.stopping();
    health.config_loaded();
    assert!(!rx.has_changed().unwrap());
    assert_eq!(health.state(), HealthState::Stopping);
}

#[test]
fn clones_share_state() {
    let health = HealthReporter::new();
    let other = health.clone();
    other.stopping();
    assert_eq!(health.state(), HealthState::Stopping);
    assert_eq!(health.state().to_string(), "stopping");
}
