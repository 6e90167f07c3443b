//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use syncline_proto::{ActionPayload, CollectionKey, PendingAction, RecordDoc};

/// Fixed reference instant that generated timestamps are offsets from.
///
/// Using one shared origin lets a property replay the generated schedule
/// against a reference model without threading wall-clock state around.
#[must_use]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Strategy for generating valid resource names.
pub fn resource_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating record IDs.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,8}").expect("Invalid regex")
}

/// Strategy for generating collection keys, with and without views.
pub fn collection_key_strategy() -> impl Strategy<Value = CollectionKey> {
    (
        resource_strategy(),
        prop::option::of(prop::string::string_regex("[a-z0-9-]{1,12}").expect("Invalid regex")),
    )
        .prop_map(|(resource, view)| match view {
            Some(view) => CollectionKey::with_view(resource, view),
            None => CollectionKey::new(resource),
        })
}

/// Strategy for generating record documents with object bodies.
pub fn record_doc_strategy() -> impl Strategy<Value = RecordDoc> {
    (
        record_id_strategy(),
        prop::string::string_regex("[A-Za-z ]{0,24}").expect("Invalid regex"),
        any::<bool>(),
    )
        .prop_map(|(id, title, liked)| {
            RecordDoc::new(id, serde_json::json!({ "title": title, "liked": liked }))
        })
}

/// Strategy for generating a batch of records with distinct IDs.
pub fn record_batch_strategy(max: usize) -> impl Strategy<Value = Vec<RecordDoc>> {
    prop::collection::vec(
        (
            prop::string::string_regex("[A-Za-z ]{0,24}").expect("Invalid regex"),
            any::<bool>(),
        ),
        0..max,
    )
    .prop_map(|bodies| {
        bodies
            .into_iter()
            .enumerate()
            .map(|(i, (title, liked))| {
                RecordDoc::new(
                    format!("r{}", i),
                    serde_json::json!({ "title": title, "liked": liked }),
                )
            })
            .collect()
    })
}

/// Strategy for generating typed action payloads.
pub fn action_payload_strategy() -> impl Strategy<Value = ActionPayload> {
    let body = prop::string::string_regex("[A-Za-z ]{0,24}")
        .expect("Invalid regex")
        .prop_map(|title| serde_json::json!({ "title": title }))
        .boxed();
    prop_oneof![
        2 => body.clone().prop_map(|body| ActionPayload::Create { body }),
        3 => body.prop_map(|body| ActionPayload::Update { body }),
        1 => Just(ActionPayload::Delete),
        3 => (
            prop::string::string_regex("[a-z]{2,10}").expect("Invalid regex"),
            any::<bool>(),
        )
            .prop_map(|(flag, enabled)| ActionPayload::Toggle { flag, enabled }),
    ]
}

/// Strategy for generating fresh pending actions enqueued within the first
/// hour after [`base_time`].
pub fn pending_action_strategy() -> impl Strategy<Value = PendingAction> {
    (
        resource_strategy(),
        record_id_strategy(),
        action_payload_strategy(),
        0i64..3_600,
    )
        .prop_map(|(resource, target_id, payload, offset)| {
            PendingAction::new(
                resource,
                target_id,
                payload,
                base_time() + Duration::seconds(offset),
            )
        })
}

/// Strategy for generating sequences of gaps (in seconds) between user
/// activity events.
pub fn activity_gaps_strategy(
    max_events: usize,
    max_gap_secs: i64,
) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0..max_gap_secs, 0..max_events)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
