//! Integration tests for the waitline queueing service
//!
//! These tests drive the whole stack below HTTP: company registration,
//! shortest-queue assignment, ticket lifecycle, wait-time estimation from
//! history, event broadcast, and retry behavior over a flaky store.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use waitline::config::QueueSettings;
use waitline::error::QueueError;
use waitline::notify::ChannelNotifier;
use waitline::queueing::QueueManager;
use waitline::store::{InMemoryQueueStore, QueueStore, RetryPolicy};
use waitline::types::{CustomerStatus, DelayOutcome, HistoryRecord, QueueEvent};
use waitline::utils::{current_timestamp, generate_id};
use waitline::wait_time::{EstimatorConfig, RollingAverageEstimator};

/// Build a complete system around an in-memory store
fn create_test_system() -> (
    Arc<QueueManager>,
    Arc<InMemoryQueueStore>,
    Arc<ChannelNotifier>,
) {
    let store = Arc::new(InMemoryQueueStore::new());
    let settings = QueueSettings::default();
    let estimator = Arc::new(
        RollingAverageEstimator::new(store.clone(), EstimatorConfig::from_settings(&settings))
            .unwrap(),
    );
    let notifier = Arc::new(ChannelNotifier::new(32));
    let manager =
        QueueManager::new(store.clone(), estimator, notifier.clone(), settings).unwrap();

    (Arc::new(manager), store, notifier)
}

fn drain(receiver: &mut broadcast::Receiver<QueueEvent>) -> Vec<QueueEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn completed_visit(
    company_id: uuid::Uuid,
    counter_id: uuid::Uuid,
    wait_seconds: u64,
) -> HistoryRecord {
    HistoryRecord {
        id: generate_id(),
        company_id,
        counter_id,
        counter_number: 1,
        otp: "000000".to_string(),
        join_time: current_timestamp(),
        served_time: Some(current_timestamp()),
        wait_seconds: Some(wait_seconds),
        status: CustomerStatus::Served,
        delays: 0,
    }
}

#[tokio::test]
async fn test_complete_queue_workflow() {
    let (manager, _store, notifier) = create_test_system();
    let mut receiver = notifier.subscribe();

    let owner = generate_id();
    let company = manager
        .create_company(owner, "Corner Cafe", "food", 2)
        .await
        .unwrap();
    let counters = manager.company_counters(company.id, owner).await.unwrap();
    assert_eq!(counters.len(), 2);

    // First two customers land on different counters and are served right
    // away; the third queues behind the first
    let a = manager.join_queue(&company.code).await.unwrap();
    let b = manager.join_queue(&company.code).await.unwrap();
    let c = manager.join_queue(&company.code).await.unwrap();

    assert_eq!((a.counter_number, a.position), (1, 1));
    assert_eq!((b.counter_number, b.position), (2, 1));
    assert_eq!((c.counter_number, c.position), (1, 2));

    let turn_events: Vec<_> = drain(&mut receiver)
        .into_iter()
        .filter_map(|event| match event {
            QueueEvent::CustomerTurn(turn) => Some(turn),
            _ => None,
        })
        .collect();
    assert_eq!(turn_events.len(), 2);
    assert_eq!(turn_events[0].otp, a.otp);
    assert_eq!(turn_events[1].otp, b.otp);

    // Serving the first counter promotes the queued customer
    let outcome = manager.serve_next(counters[0].id, owner).await.unwrap();
    assert_eq!(outcome.served_otp, a.otp);
    assert_eq!(outcome.next_otp.as_deref(), Some(c.otp.as_str()));

    let promoted_turns = drain(&mut receiver);
    assert_eq!(promoted_turns.len(), 1);

    let c_status = manager.ticket_status(&c.otp).await.unwrap();
    assert_eq!(c_status.status, CustomerStatus::Serving);
    assert_eq!(c_status.position, 1);

    manager.serve_next(counters[1].id, owner).await.unwrap();

    let stats = manager.company_stats(company.id, owner).await.unwrap();
    assert_eq!(stats.total_served, 2);
    assert_eq!(stats.total_delayed, 0);
}

#[tokio::test]
async fn test_wait_estimates_follow_completed_visits() {
    let (manager, store, _notifier) = create_test_system();

    let owner = generate_id();
    let company = manager
        .create_company(owner, "Post Office", "mail", 1)
        .await
        .unwrap();
    let counter = manager.company_counters(company.id, owner).await.unwrap()[0].clone();

    for wait in [100u64, 120, 140, 160, 180] {
        store
            .append_history(completed_visit(company.id, counter.id, wait))
            .await
            .unwrap();
    }

    // Rolling average of the five samples is 140 seconds per customer
    let first = manager.join_queue(&company.code).await.unwrap();
    assert_eq!(first.estimated_wait_seconds, 0);

    let second = manager.join_queue(&company.code).await.unwrap();
    assert_eq!(second.estimated_wait_seconds, 140);

    let third = manager.join_queue(&company.code).await.unwrap();
    assert_eq!(third.estimated_wait_seconds, 280);

    // The status surface scales by the full position
    let status = manager.ticket_status(&third.otp).await.unwrap();
    assert_eq!(status.estimated_wait_seconds, 3 * 140);
}

#[tokio::test]
async fn test_default_estimate_below_sample_threshold() {
    let (manager, store, _notifier) = create_test_system();

    let owner = generate_id();
    let company = manager
        .create_company(owner, "New Branch", "bank", 1)
        .await
        .unwrap();
    let counter = manager.company_counters(company.id, owner).await.unwrap()[0].clone();

    // Four samples is below the five-sample threshold
    for wait in [10u64, 20, 30, 40] {
        store
            .append_history(completed_visit(company.id, counter.id, wait))
            .await
            .unwrap();
    }

    manager.join_queue(&company.code).await.unwrap();
    let second = manager.join_queue(&company.code).await.unwrap();
    assert_eq!(second.estimated_wait_seconds, 180);
}

#[tokio::test]
async fn test_transient_store_failures_are_retried() {
    let store = Arc::new(fixtures::FlakyStore::new());
    let settings = QueueSettings::default();
    let estimator = Arc::new(
        RollingAverageEstimator::new(store.clone(), EstimatorConfig::from_settings(&settings))
            .unwrap(),
    );
    let notifier = Arc::new(ChannelNotifier::new(8));
    let manager = QueueManager::new(store.clone(), estimator, notifier, settings)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        });

    let owner = generate_id();
    let company = manager
        .create_company(owner, "Outage Mart", "retail", 1)
        .await
        .unwrap();

    // Two failures are absorbed by the retry loop
    store.fail_next(2);
    let receipt = manager.join_queue(&company.code).await.unwrap();
    assert_eq!(receipt.position, 1);

    // A sustained outage surfaces as Unavailable
    store.fail_next(100);
    let err = manager.join_queue(&company.code).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<QueueError>(),
        Some(QueueError::Unavailable { .. })
    ));
    store.fail_next(0);
}

#[tokio::test]
async fn test_owner_boundaries_between_companies() {
    let (manager, _store, _notifier) = create_test_system();

    let alice = generate_id();
    let bob = generate_id();
    let shop = manager
        .create_company(alice, "Alice's Shop", "retail", 1)
        .await
        .unwrap();
    let clinic = manager
        .create_company(bob, "Bob's Clinic", "health", 1)
        .await
        .unwrap();
    assert_ne!(shop.code, clinic.code);

    let shop_counter = manager.company_counters(shop.id, alice).await.unwrap()[0].id;
    manager.join_queue(&shop.code).await.unwrap();

    // Bob cannot operate Alice's counter
    let err = manager.serve_next(shop_counter, bob).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<QueueError>(),
        Some(QueueError::Unauthorized { .. })
    ));

    // Queues are fully independent
    let clinic_counter = manager.company_counters(clinic.id, bob).await.unwrap()[0].id;
    let err = manager.serve_next(clinic_counter, bob).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<QueueError>(),
        Some(QueueError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_delay_cycle_preserves_service_order() {
    let (manager, _store, _notifier) = create_test_system();

    let owner = generate_id();
    let company = manager
        .create_company(owner, "Registry", "gov", 1)
        .await
        .unwrap();
    let counter_id = manager.company_counters(company.id, owner).await.unwrap()[0].id;

    let first = manager.join_queue(&company.code).await.unwrap();
    let second = manager.join_queue(&company.code).await.unwrap();
    let third = manager.join_queue(&company.code).await.unwrap();

    let delayed = manager.delay_current(counter_id, owner).await.unwrap();
    assert_eq!(delayed.outcome, DelayOutcome::Requeued);
    assert_eq!(delayed.otp, first.otp);

    // Service order is now second, third, first
    for expected in [&second.otp, &third.otp, &first.otp] {
        let outcome = manager.serve_next(counter_id, owner).await.unwrap();
        assert_eq!(&outcome.served_otp, expected);
    }

    let stats = manager.company_stats(company.id, owner).await.unwrap();
    assert_eq!(stats.total_served, 3);
    assert_eq!(stats.total_delayed, 1);
}
