//! Integration tests for the assembled client.
//!
//! Each scenario drives a [`SynclineClient`] over a scripted transport and
//! in-memory stores, with task intervals shortened to the millisecond
//! scale so the background loops act within the test.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use syncline_client::{ClientConfig, ClientError, SynclineClient};
use syncline_engine::{EngineConfig, EngineEvent, MutateOutcome, QUEUE_NAMESPACE};
use syncline_net::{BreakerConfig, NetError};
use syncline_proto::{ActionPayload, BackoffPolicy, CollectionKey, FetchResponse};
use syncline_session::{SessionConfig, SessionEvent, SessionState};
use syncline_store::{KvStore, MemoryKvStore, MemoryRecordStore, RecordStore};
use syncline_testkit::prelude::*;

/// Polls `check` every 10ms until it holds, panicking after five seconds.
async fn eventually<F: Fn() -> bool>(check: F, what: &str) {
    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(5);
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
}

fn fast_config() -> ClientConfig {
    ClientConfig::default()
        .with_session(fast_session_config())
        .with_engine(
            EngineConfig::default()
                .with_backoff(BackoffPolicy {
                    base_delay_ms: 10,
                    max_delay_ms: 50,
                })
                .with_drain_interval(StdDuration::from_millis(25)),
        )
        .with_net(no_retry_net_config())
        .with_idle_check_interval(StdDuration::from_millis(25))
        .with_refresh_check_interval(StdDuration::from_secs(30))
        .with_fetch_retry_interval(StdDuration::from_secs(30))
}

fn toggle_payload() -> ActionPayload {
    ActionPayload::Toggle {
        flag: "liked".into(),
        enabled: true,
    }
}

fn scripted_client(
    config: ClientConfig,
) -> (
    Arc<ScriptedTransport>,
    Arc<MemoryKvStore>,
    Arc<MemoryRecordStore>,
    SynclineClient<ScriptedTransport>,
) {
    let transport = Arc::new(ScriptedTransport::new());
    let kv = Arc::new(MemoryKvStore::new());
    let records = Arc::new(MemoryRecordStore::new());
    let client = SynclineClient::new(
        config,
        Arc::clone(&transport),
        Arc::clone(&kv) as Arc<dyn KvStore>,
        Arc::clone(&records) as Arc<dyn RecordStore>,
    );
    (transport, kv, records, client)
}

#[tokio::test]
async fn login_starts_tasks_and_logout_stops_them() {
    let (_transport, _kv, _records, client) = scripted_client(fast_config());

    assert!(!client.is_authenticated());
    let user = client
        .login(&test_credentials())
        .await
        .expect("login succeeds");
    assert_eq!(user, test_user());
    assert!(client.is_authenticated());

    let tasks = client.active_tasks();
    for name in ["idle-watch", "token-refresh", "queue-drain", "collection-fetch"] {
        assert!(tasks.contains(&name), "missing task {}", name);
    }

    client.logout().await.expect("logout succeeds");
    assert!(!client.is_authenticated());
    assert!(client.active_tasks().is_empty());
    assert_eq!(client.session_state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn stale_read_is_refreshed_in_background() {
    let (transport, _kv, _records, client) = scripted_client(fast_config());
    transport.script_fetch(Ok(FetchResponse::new(records(3))));
    client
        .login(&test_credentials())
        .await
        .expect("login succeeds");

    let key = CollectionKey::with_view("posts", "feed");
    let first = client.get_collection(&key);
    assert!(first.items.is_empty());
    assert!(!first.freshness.is_fresh());

    // The read scheduled a fetch; the stats tick over once it lands
    eventually(|| client.engine_stats().fetches >= 1, "background fetch").await;
    let filled = client.get_collection(&key);
    assert_eq!(filled.items.len(), 3);
    assert!(filled.freshness.is_fresh());
    assert_eq!(transport.fetch_calls(), 1);
}

#[tokio::test]
async fn queued_mutation_is_delivered_by_the_drain_loop() {
    let (transport, _kv, _records, client) = scripted_client(fast_config());
    client
        .login(&test_credentials())
        .await
        .expect("login succeeds");
    transport.fail_apply_times(&NetError::transient("connection reset"), 1);

    let outcome = client
        .mutate("posts", "p1", toggle_payload())
        .await
        .expect("indeterminate outcome queues");
    assert!(outcome.is_queued());
    assert_eq!(client.queue_counts().total(), 1);

    eventually(|| client.queue_counts().total() == 0, "queue drained").await;
    eventually(
        || client.engine_stats().actions_delivered == 1,
        "delivery recorded",
    )
    .await;
    assert_eq!(transport.apply_calls(), 2);
}

#[tokio::test]
async fn drain_waits_out_open_breaker_and_recovers() {
    let config = fast_config().with_net(
        no_retry_net_config().with_breaker(
            BreakerConfig::default()
                .with_failure_threshold(1)
                .with_reset_timeout(StdDuration::from_millis(150)),
        ),
    );
    let (transport, _kv, _records, client) = scripted_client(config);
    client
        .login(&test_credentials())
        .await
        .expect("login succeeds");
    transport.fail_apply_times(&NetError::transient("connection refused"), 1);

    let outcome = client
        .mutate("posts", "p1", toggle_payload())
        .await
        .expect("indeterminate outcome queues");
    assert!(outcome.is_queued());
    // The single failure tripped the breaker
    assert!(!client.is_online());

    eventually(
        || client.queue_counts().total() == 0,
        "delivery after cooldown",
    )
    .await;
    assert!(client.is_online());
    assert!(client.engine_stats().drain_skips >= 1);
    assert_eq!(transport.apply_calls(), 2);
}

#[tokio::test]
async fn abandoned_action_is_reported_and_discardable() {
    let config = fast_config().with_engine(
        EngineConfig::default()
            .with_max_retries(1)
            .with_backoff(BackoffPolicy {
                base_delay_ms: 10,
                max_delay_ms: 50,
            })
            .with_drain_interval(StdDuration::from_millis(25)),
    );
    let (transport, _kv, _records, client) = scripted_client(config);
    client
        .login(&test_credentials())
        .await
        .expect("login succeeds");
    let events = client.subscribe_engine();
    transport.fail_apply_times(&NetError::transient("connection reset"), 2);

    let outcome = client
        .mutate("posts", "p1", toggle_payload())
        .await
        .expect("indeterminate outcome queues");
    let MutateOutcome::Queued { action_id } = outcome else {
        panic!("expected queued outcome");
    };

    eventually(|| !client.abandoned_actions().is_empty(), "abandonment").await;
    let abandoned = client.abandoned_actions();
    assert_eq!(abandoned.len(), 1);
    assert_eq!(abandoned[0].id, action_id);
    assert_eq!(abandoned[0].retry_count, 1);

    // The feed carries the abandoned action for surfacing in the UI
    let mut saw_abandoned = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::ActionAbandoned { action } = event {
            assert_eq!(action.id, action_id);
            saw_abandoned = true;
        }
    }
    assert!(saw_abandoned);

    let removed = client
        .discard_action(action_id)
        .await
        .expect("discard succeeds");
    assert_eq!(removed.id, action_id);
    assert!(client.abandoned_actions().is_empty());
    assert_eq!(client.queue_counts().total(), 0);
}

#[tokio::test]
async fn idle_warning_prompts_and_activity_recovers_the_session() {
    // Warning opens 100ms into idleness; expiry sits seconds away so the
    // test never races the deadline itself
    let config = fast_config()
        .with_session(
            SessionConfig::default()
                .with_idle_timeout(Duration::seconds(5))
                .with_warning_lead(Duration::milliseconds(4_900))
                .with_activity_throttle(Duration::zero()),
        )
        .with_idle_check_interval(StdDuration::from_millis(20));
    let (_transport, _kv, _records, client) = scripted_client(config);
    client
        .login(&test_credentials())
        .await
        .expect("login succeeds");
    let events = client.subscribe_session();

    await_idle_warning(&events).await;
    assert_eq!(client.session_state(), SessionState::Warning);

    // The stay-signed-in prompt answers with an activity event
    assert!(client.record_activity());
    assert_eq!(client.session_state(), SessionState::Active);

    // The idle clock restarted: the warning threshold is crossed again
    // instead of the session expiring
    await_idle_warning(&events).await;
    assert!(client.is_authenticated());
}

/// Polls the session feed until an [`SessionEvent::IdleWarning`] arrives,
/// skipping other events, panicking after five seconds.
async fn await_idle_warning(events: &std::sync::mpsc::Receiver<SessionEvent>) {
    let deadline = tokio::time::Instant::now() + StdDuration::from_secs(5);
    loop {
        if let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::IdleWarning { .. }) {
                return;
            }
            continue;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for the idle warning event");
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn idle_timeout_signs_out_and_clears_engine_state() {
    let config = fast_config()
        .with_session(
            SessionConfig::default()
                .with_idle_timeout(Duration::milliseconds(150))
                .with_warning_lead(Duration::milliseconds(50))
                .with_activity_throttle(Duration::zero()),
        )
        .with_engine(EngineConfig::default().with_drain_interval(StdDuration::from_secs(30)))
        .with_idle_check_interval(StdDuration::from_millis(20))
        .with_refresh_check_interval(StdDuration::from_millis(20))
        .with_fetch_retry_interval(StdDuration::from_millis(20));
    let (transport, _kv, records, client) = scripted_client(config);
    client
        .login(&test_credentials())
        .await
        .expect("login succeeds");
    transport.fail_apply_times(&NetError::transient("connection reset"), 1);
    client
        .mutate("posts", "p1", toggle_payload())
        .await
        .expect("indeterminate outcome queues");
    assert_eq!(client.queue_counts().total(), 1);

    eventually(
        || client.session_state() == SessionState::Unauthenticated,
        "idle sign-out",
    )
    .await;
    assert!(!client.is_authenticated());
    eventually(|| client.queue_counts().total() == 0, "engine cleared").await;
    let leftover = records
        .list(QUEUE_NAMESPACE)
        .await
        .expect("list queue mirror");
    assert!(leftover.is_empty());

    // Only the drain loop is still waiting on its long tick; the other
    // loops noticed the sign-out and finished themselves
    eventually(
        || client.active_tasks() == ["queue-drain"],
        "observer loops finished",
    )
    .await;
}

#[tokio::test]
async fn restore_resumes_queued_work_across_restart() {
    let transport = Arc::new(ScriptedTransport::new());
    let kv = Arc::new(MemoryKvStore::new());
    let records = Arc::new(MemoryRecordStore::new());

    // First process: sign in, queue a mutation, then die without logout
    {
        let slow = fast_config()
            .with_engine(EngineConfig::default().with_drain_interval(StdDuration::from_secs(30)));
        let client = SynclineClient::new(
            slow,
            Arc::clone(&transport),
            Arc::clone(&kv) as Arc<dyn KvStore>,
            Arc::clone(&records) as Arc<dyn RecordStore>,
        );
        client
            .login(&test_credentials())
            .await
            .expect("login succeeds");
        transport.fail_apply_times(&NetError::transient("connection reset"), 1);
        let outcome = client
            .mutate("posts", "p1", toggle_payload())
            .await
            .expect("indeterminate outcome queues");
        assert!(outcome.is_queued());
    }

    // Second process: restore the session and let the drain loop finish
    // what the first one left behind
    let client = SynclineClient::new(
        fast_config(),
        Arc::clone(&transport),
        Arc::clone(&kv) as Arc<dyn KvStore>,
        Arc::clone(&records) as Arc<dyn RecordStore>,
    );
    let restored = client.restore().await.expect("restore succeeds");
    assert!(restored);
    assert_eq!(client.current_user(), Some(test_user()));
    assert_eq!(client.queue_counts().total(), 1);

    eventually(
        || client.queue_counts().total() == 0,
        "queued action delivered",
    )
    .await;
    assert_eq!(transport.apply_calls(), 2);
}

#[tokio::test]
async fn restore_without_slot_drops_orphaned_mirror() {
    let transport = Arc::new(ScriptedTransport::new());
    let records = Arc::new(MemoryRecordStore::new());

    {
        let client = SynclineClient::new(
            fast_config().with_engine(
                EngineConfig::default().with_drain_interval(StdDuration::from_secs(30)),
            ),
            Arc::clone(&transport),
            Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>,
            Arc::clone(&records) as Arc<dyn RecordStore>,
        );
        client
            .login(&test_credentials())
            .await
            .expect("login succeeds");
        transport.fail_apply_times(&NetError::transient("connection reset"), 1);
        client
            .mutate("posts", "p1", toggle_payload())
            .await
            .expect("indeterminate outcome queues");
    }
    let mirrored = records
        .list(QUEUE_NAMESPACE)
        .await
        .expect("list queue mirror");
    assert!(!mirrored.is_empty());

    // Second process lost its kv store; the session is unrecoverable and
    // the leftover mirror must not leak into the next sign-in
    let client = SynclineClient::new(
        fast_config(),
        Arc::clone(&transport),
        Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>,
        Arc::clone(&records) as Arc<dyn RecordStore>,
    );
    let restored = client.restore().await.expect("restore reports cleanly");
    assert!(!restored);
    assert!(!client.is_authenticated());
    let leftover = records
        .list(QUEUE_NAMESPACE)
        .await
        .expect("list queue mirror");
    assert!(leftover.is_empty());
    assert_eq!(client.queue_counts().total(), 0);
}

#[tokio::test]
async fn auth_rejection_during_manual_drain_ends_session() {
    let config = fast_config()
        .with_engine(EngineConfig::default().with_drain_interval(StdDuration::from_secs(30)));
    let (transport, _kv, records, client) = scripted_client(config);
    client
        .login(&test_credentials())
        .await
        .expect("login succeeds");
    transport.fail_apply_times(&NetError::transient("connection reset"), 1);
    client
        .mutate("posts", "p1", toggle_payload())
        .await
        .expect("indeterminate outcome queues");

    transport.script_apply(Err(NetError::auth("token revoked")));
    let result = client.drain_now().await;
    assert!(matches!(result, Err(ClientError::Engine(e)) if e.is_auth()));

    assert_eq!(client.session_state(), SessionState::Unauthenticated);
    assert!(client.active_tasks().is_empty());
    assert_eq!(client.queue_counts().total(), 0);
    let leftover = records
        .list(QUEUE_NAMESPACE)
        .await
        .expect("list queue mirror");
    assert!(leftover.is_empty());

    // A later sign-in starts from scratch
    client
        .login(&test_credentials())
        .await
        .expect("second login succeeds");
    assert!(client.is_authenticated());
    assert_eq!(client.queue_counts().total(), 0);
}

#[tokio::test]
async fn mutate_while_signed_out_fails_fast() {
    let (transport, _kv, _records, client) = scripted_client(fast_config());
    let result = client.mutate("posts", "p1", toggle_payload()).await;
    assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    assert_eq!(transport.total_calls(), 0);
}
