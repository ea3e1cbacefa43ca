//! Tests for [`ResponseCache`] and [`Fingerprint`].

use std::time::Duration;

use serde_json::json;

use quill::schema::defaults;
use quill::{
    CacheConfig, Enforced, Fingerprint, GenerationParams, OperationKind, RequestInput,
    ResponseCache,
};

fn key(op: OperationKind, input: RequestInput) -> Fingerprint {
    let schema = defaults::for_operation(op);
    Fingerprint::compute(op, &input.normalize().unwrap(), &schema)
}

fn improve(text: &str) -> Fingerprint {
    key(OperationKind::Improve, RequestInput::new(text))
}

fn bullets(items: &[&str]) -> Enforced {
    Enforced {
        value: json!(items),
        was_truncated: false,
        dropped_items: 0,
        repaired: false,
    }
}

// ============================================================================
// ResponseCache
// ============================================================================

#[tokio::test]
async fn miss_returns_none() {
    let cache = ResponseCache::new(&CacheConfig::default());
    assert!(cache.get(&improve("nothing here")).await.is_none());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn put_then_get() {
    let cache = ResponseCache::new(&CacheConfig::default());
    cache
        .put(improve("Led a team"), bullets(&["Led a team of 5"]))
        .await;

    let got = cache.get(&improve("Led a team")).await.unwrap();
    assert_eq!(got.value, json!(["Led a team of 5"]));
}

#[tokio::test]
async fn overwrite_replaces_entry() {
    let cache = ResponseCache::new(&CacheConfig::default());
    cache.put(improve("a"), bullets(&["first"])).await;
    cache.put(improve("a"), bullets(&["second"])).await;

    assert_eq!(
        cache.get(&improve("a")).await.unwrap(),
        bullets(&["second"])
    );
}

#[tokio::test]
async fn truncation_flag_is_stored_with_the_value() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let stored = Enforced {
        was_truncated: true,
        ..bullets(&["Organized...", "Raised"])
    };
    cache.put(improve("x"), stored.clone()).await;

    assert_eq!(cache.get(&improve("x")).await, Some(stored));
}

#[tokio::test(start_paused = true)]
async fn entry_is_fresh_until_the_ttl_boundary() {
    let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_secs(60)));
    cache.put(improve("a"), bullets(&["a"])).await;

    tokio::time::advance(Duration::from_millis(59_999)).await;
    assert!(cache.get(&improve("a")).await.is_some());

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(cache.get(&improve("a")).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn rewrite_after_expiry_is_fresh_again() {
    let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_secs(10)));
    cache.put(improve("a"), bullets(&["old"])).await;

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(cache.get(&improve("a")).await.is_none());

    cache.put(improve("a"), bullets(&["new"])).await;
    assert_eq!(cache.get(&improve("a")).await, Some(bullets(&["new"])));
}

#[tokio::test]
async fn clear_evicts_everything() {
    let cache = ResponseCache::new(&CacheConfig::default());
    cache.put(improve("a"), bullets(&["a"])).await;
    cache.put(improve("b"), bullets(&["b"])).await;

    cache.clear();

    assert!(cache.get(&improve("a")).await.is_none());
    assert!(cache.get(&improve("b")).await.is_none());
}

#[test]
fn config_defaults() {
    let config = CacheConfig::default();
    assert_eq!(config.max_entries, 10_000);
    assert_eq!(config.ttl, Duration::from_secs(600));

    let cache = ResponseCache::new(&config.ttl(Duration::from_secs(30)));
    assert_eq!(cache.ttl(), Duration::from_secs(30));
}

// ============================================================================
// Fingerprint
// ============================================================================

#[test]
fn whitespace_and_key_case_do_not_split_entries() {
    let a = key(
        OperationKind::GenerateDraft,
        RequestInput::new("Organized a   cleanup\n with 30 volunteers ")
            .field("Experience_Type", "volunteer"),
    );
    let b = key(
        OperationKind::GenerateDraft,
        RequestInput::new("Organized a cleanup with 30 volunteers")
            .field("experience_type", "  volunteer"),
    );
    assert_eq!(a, b);
}

#[test]
fn text_case_is_significant() {
    assert_ne!(improve("Built an API"), improve("built an api"));
}

#[test]
fn field_insertion_order_does_not_matter() {
    let op = OperationKind::Finalize;
    let ab = RequestInput::new("x")
        .field("answer_1", "5 people")
        .field("answer_2", "3 months");
    let ba = RequestInput::new("x")
        .field("answer_2", "3 months")
        .field("answer_1", "5 people");
    assert_eq!(key(op, ab), key(op, ba));
}

#[test]
fn every_operation_gets_its_own_key() {
    let keys: std::collections::HashSet<_> = OperationKind::ALL
        .into_iter()
        .map(|op| key(op, RequestInput::new("same text")))
        .collect();
    assert_eq!(keys.len(), OperationKind::ALL.len());
}

#[test]
fn generation_params_are_part_of_the_key() {
    let op = OperationKind::Improve;
    let base = RequestInput::new("same");
    let keyed = |params: GenerationParams| key(op, base.clone().params(params));

    let default = key(op, base.clone());
    let other_model = keyed(GenerationParams::default().model("gpt-4o"));
    let other_budget = keyed(GenerationParams::default().max_tokens(500));
    let other_temp = keyed(GenerationParams::default().temperature(0.1));

    assert_ne!(default, other_model);
    assert_ne!(default, other_budget);
    assert_ne!(default, other_temp);
}

#[test]
fn model_case_and_float_noise_are_normalized_away() {
    let loud = GenerationParams::default()
        .model("GPT-4o-mini")
        .temperature(0.7);
    let noisy = GenerationParams::default()
        .model("gpt-4o-mini")
        .temperature(0.700_001);

    let a = key(OperationKind::Improve, RequestInput::new("x").params(loud));
    let b = key(OperationKind::Improve, RequestInput::new("x").params(noisy));
    assert_eq!(a, b);
}
