//! End-to-end gateway behaviour against scripted providers.
//!
//! Timing-sensitive tests run on a paused clock so TTLs, backoff and
//! provider latency advance deterministically.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use quill::error::ErrorClass;
use quill::{
    AiGateway, CacheConfig, GatewayError, MemorySink, OperationKind, OutcomeSink, ProviderRequest,
    RequestInput, ResponseSchema, Result, RetryConfig, Source, TextProvider,
};

// ============================================================================
// Mock providers
// ============================================================================

/// Replays scripted replies in order, then repeats `fallback`.
struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: Result<String>,
    latency: Duration,
    calls: AtomicU32,
}

impl ScriptedProvider {
    fn always(reply: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(reply.to_string()),
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    fn failing(err: GatewayError) -> Self {
        Self {
            fallback: Err(err),
            ..Self::always("")
        }
    }

    fn then(self, reply: Result<String>) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn attempt(&self, _request: &ProviderRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Sink that always fails.
struct BrokenSink;

#[async_trait]
impl OutcomeSink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    async fn record(&self, _outcome: &quill::CallOutcome) -> Result<()> {
        Err(GatewayError::Sink {
            sink: "broken".into(),
            message: "disk full".into(),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

const BULLETS: &str = r#"["Led a team of 5", "Cut costs by 20%"]"#;

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(10))
        .jitter(Duration::from_millis(5))
        .attempt_timeout(Duration::from_secs(5))
}

fn gateway(provider: Arc<ScriptedProvider>, sink: Arc<MemorySink>) -> AiGateway {
    AiGateway::builder()
        .provider(provider)
        .retry(fast_retry())
        .sink(sink)
        .build()
        .unwrap()
}

fn improve_schema() -> ResponseSchema {
    ResponseSchema::list(1, 5, 150)
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn second_identical_request_is_served_from_cache() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());
    let input = RequestInput::new("Led a team");

    let first = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    let second = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();

    assert_eq!(first.source, Source::Fresh);
    assert_eq!(second.source, Source::Cache);
    assert_eq!(first.value, second.value);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(provider.call_count(), 1);
    // cache hits record no outcome
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn whitespace_variants_share_a_cache_entry() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let gw = gateway(provider.clone(), Arc::new(MemorySink::new()));

    gw.request(
        OperationKind::Improve,
        &RequestInput::new("Led   a\nteam"),
        &improve_schema(),
    )
    .await
    .unwrap();
    let again = gw
        .request(
            OperationKind::Improve,
            &RequestInput::new("  Led a team "),
            &improve_schema(),
        )
        .await
        .unwrap();

    assert_eq!(again.source, Source::Cache);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn different_operations_do_not_share_entries() {
    let provider = Arc::new(ScriptedProvider::always(r#"["q1?", "q2?", "q3?"]"#));
    let gw = gateway(provider.clone(), Arc::new(MemorySink::new()));
    let input = RequestInput::new("Tutored kids");

    gw.request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    let other = gw
        .request(
            OperationKind::GenerateFollowups,
            &input,
            &ResponseSchema::list(3, 3, 200),
        )
        .await
        .unwrap();

    assert_eq!(other.source, Source::Fresh);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_triggers_a_new_call() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let sink = Arc::new(MemorySink::new());
    let gw = AiGateway::builder()
        .provider(provider.clone())
        .cache(CacheConfig::new().ttl(Duration::from_secs(60)))
        .sink(sink.clone())
        .build()
        .unwrap();
    let input = RequestInput::new("Led a team");

    gw.request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(59)).await;
    let cached = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    assert_eq!(cached.source, Source::Cache);

    tokio::time::advance(Duration::from_secs(2)).await;
    let refreshed = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    assert_eq!(refreshed.source, Source::Fresh);
    assert_eq!(provider.call_count(), 2);
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn clear_cache_forces_a_new_call() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let gw = gateway(provider.clone(), Arc::new(MemorySink::new()));
    let input = RequestInput::new("Led a team");

    gw.request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    assert_eq!(gw.cache_stats().in_flight, 0);

    gw.clear_cache();
    let after = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    assert_eq!(after.source, Source::Fresh);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn different_schemas_do_not_share_entries() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let gw = gateway(provider.clone(), Arc::new(MemorySink::new()));
    let input = RequestInput::new("Led a team");
    let narrow_schema = ResponseSchema::list(1, 1, 150);

    gw.request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    let narrow = gw
        .request(OperationKind::Improve, &input, &narrow_schema)
        .await
        .unwrap();

    assert_eq!(narrow.source, Source::Fresh);
    assert_eq!(narrow.value, json!(["Led a team of 5"]));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cache_stats_split_valid_and_expired_entries() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let gw = AiGateway::builder()
        .provider(provider)
        .cache(CacheConfig::new().ttl(Duration::from_secs(60)))
        .build()
        .unwrap();

    let first = RequestInput::new("Led a team");
    gw.request(OperationKind::Improve, &first, &improve_schema())
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(40)).await;
    let second = RequestInput::new("Cut costs");
    gw.request(OperationKind::Improve, &second, &improve_schema())
        .await
        .unwrap();

    let stats = gw.cache_stats();
    assert_eq!((stats.valid, stats.expired, stats.entries), (2, 0, 2));

    tokio::time::advance(Duration::from_secs(30)).await;
    let stats = gw.cache_stats();
    assert_eq!((stats.valid, stats.expired, stats.entries), (1, 1, 2));
}

// ============================================================================
// Coalescing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_identical_requests_make_one_provider_call() {
    let provider =
        Arc::new(ScriptedProvider::always(BULLETS).with_latency(Duration::from_millis(200)));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let gw = gw.clone();
        handles.push(tokio::spawn(async move {
            gw.request(
                OperationKind::Improve,
                &RequestInput::new("Led a team"),
                &ResponseSchema::list(1, 5, 150),
            )
            .await
        }));
    }

    let mut values = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.source, Source::Fresh);
        values.push(response.value);
    }

    assert_eq!(provider.call_count(), 1);
    let expected = json!(["Led a team of 5", "Cut costs by 20%"]);
    assert!(values.iter().all(|v| *v == expected));
    // one outcome per leader invocation, not per waiter
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_followers_share_the_leader_error() {
    let provider = Arc::new(
        ScriptedProvider::failing(GatewayError::AuthenticationFailed)
            .with_latency(Duration::from_millis(100)),
    );
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let mut handles = Vec::new();
    for _ in 0..5 {
        let gw = gw.clone();
        handles.push(tokio::spawn(async move {
            gw.request(
                OperationKind::Improve,
                &RequestInput::new("Led a team"),
                &ResponseSchema::list(1, 5, 150),
            )
            .await
        }));
    }

    for handle in handles {
        assert_eq!(
            handle.await.unwrap().unwrap_err(),
            GatewayError::AuthenticationFailed
        );
    }
    assert_eq!(provider.call_count(), 1);
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn distinct_fingerprints_run_in_parallel() {
    let provider =
        Arc::new(ScriptedProvider::always(BULLETS).with_latency(Duration::from_millis(500)));
    let gw = gateway(provider.clone(), Arc::new(MemorySink::new()));

    let start = tokio::time::Instant::now();
    let a = {
        let gw = gw.clone();
        tokio::spawn(async move {
            gw.request(
                OperationKind::Improve,
                &RequestInput::new("first"),
                &ResponseSchema::list(1, 5, 150),
            )
            .await
        })
    };
    let b = {
        let gw = gw.clone();
        tokio::spawn(async move {
            gw.request(
                OperationKind::Improve,
                &RequestInput::new("second"),
                &ResponseSchema::list(1, 5, 150),
            )
            .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(provider.call_count(), 2);
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn abandoned_leader_does_not_cancel_the_call() {
    let provider =
        Arc::new(ScriptedProvider::always(BULLETS).with_latency(Duration::from_millis(300)));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let leader = {
        let gw = gw.clone();
        tokio::spawn(async move {
            gw.request(
                OperationKind::Improve,
                &RequestInput::new("Led a team"),
                &ResponseSchema::list(1, 5, 150),
            )
            .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let follower = {
        let gw = gw.clone();
        tokio::spawn(async move {
            gw.request(
                OperationKind::Improve,
                &RequestInput::new("Led a team"),
                &ResponseSchema::list(1, 5, 150),
            )
            .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    leader.abort();

    let response = follower.await.unwrap().unwrap();
    assert_eq!(response.source, Source::Fresh);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(sink.len(), 1);
}

// ============================================================================
// Retry and failure outcomes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_and_attempts_recorded() {
    let provider = Arc::new(
        ScriptedProvider::always(BULLETS)
            .then(Err(GatewayError::Http("connection reset".into())))
            .then(Err(GatewayError::Api {
                status: 502,
                message: "bad gateway".into(),
            })),
    );
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let response = gw
        .request(
            OperationKind::Improve,
            &RequestInput::new("Led a team"),
            &improve_schema(),
        )
        .await
        .unwrap();

    assert_eq!(response.source, Source::Fresh);
    assert_eq!(provider.call_count(), 3);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].provider, "scripted");
}

#[tokio::test]
async fn fatal_error_records_failure_outcome() {
    let provider = Arc::new(ScriptedProvider::failing(GatewayError::ContentFiltered {
        reason: "policy".into(),
    }));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let err = gw
        .request(
            OperationKind::Improve,
            &RequestInput::new("Led a team"),
            &improve_schema(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Fatal);
    assert_eq!(provider.call_count(), 1);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].attempts, 1);
    assert_eq!(records[0].error_class, Some(ErrorClass::Fatal));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_transient_class() {
    let provider = Arc::new(ScriptedProvider::failing(GatewayError::Api {
        status: 503,
        message: "overloaded".into(),
    }));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let err = gw
        .request(
            OperationKind::Improve,
            &RequestInput::new("Led a team"),
            &improve_schema(),
        )
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(provider.call_count(), 3);
    assert_eq!(sink.records()[0].attempts, 3);
    assert_eq!(sink.records()[0].error_class, Some(ErrorClass::Transient));
}

#[tokio::test]
async fn failures_are_not_cached() {
    let provider = Arc::new(
        ScriptedProvider::always(BULLETS).then(Err(GatewayError::AuthenticationFailed)),
    );
    let gw = gateway(provider.clone(), Arc::new(MemorySink::new()));
    let input = RequestInput::new("Led a team");

    assert!(
        gw.request(OperationKind::Improve, &input, &improve_schema())
            .await
            .is_err()
    );
    let retry = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();

    assert_eq!(retry.source, Source::Fresh);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn empty_input_never_reaches_the_provider() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let err = gw
        .request(
            OperationKind::Improve,
            &RequestInput::new("   \n\t "),
            &improve_schema(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::InvalidInput(_)));
    assert_eq!(provider.call_count(), 0);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn sink_failure_does_not_fail_the_request() {
    let provider = Arc::new(ScriptedProvider::always(BULLETS));
    let backup = Arc::new(MemorySink::new());
    let gw = AiGateway::builder()
        .provider(provider)
        .sink(Arc::new(BrokenSink))
        .sink(backup.clone())
        .build()
        .unwrap();

    let response = gw
        .request(
            OperationKind::Improve,
            &RequestInput::new("Led a team"),
            &improve_schema(),
        )
        .await
        .unwrap();

    assert_eq!(response.source, Source::Fresh);
    assert_eq!(backup.len(), 1);
}

// ============================================================================
// Schema enforcement through the gateway
// ============================================================================

#[tokio::test]
async fn truncation_flag_survives_the_cache() {
    let long = "x".repeat(200);
    let provider = Arc::new(ScriptedProvider::always(&format!(r#"["{long}"]"#)));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider, sink.clone());
    let input = RequestInput::new("Led a team");

    let fresh = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();
    let cached = gw
        .request(OperationKind::Improve, &input, &improve_schema())
        .await
        .unwrap();

    assert!(fresh.was_truncated);
    assert!(cached.was_truncated);
    assert_eq!(fresh.items(None)[0].chars().count(), 150);
    assert!(sink.records()[0].was_truncated);
}

#[tokio::test]
async fn unrepairable_response_is_a_schema_failure() {
    let provider = Arc::new(ScriptedProvider::always("[]"));
    let sink = Arc::new(MemorySink::new());
    let gw = gateway(provider.clone(), sink.clone());

    let err = gw
        .request(
            OperationKind::Improve,
            &RequestInput::new("Led a team"),
            &improve_schema(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Schema);
    // schema failures are not retried
    assert_eq!(provider.call_count(), 1);
    assert_eq!(sink.records()[0].error_class, Some(ErrorClass::Schema));
    assert_eq!(gw.cache_stats().in_flight, 0);
}

#[tokio::test]
async fn default_schemas_drive_request_default() {
    let draft = json!({
        "title": "Community Volunteer",
        "bullet_points": ["Led 12 volunteers", "Raised $500", "Ran 4 events"],
        "skills": ["Leadership", "Fundraising", "Planning", "Outreach", "Teamwork"],
        "questions": ["How many people?", "How long?", "What changed?"]
    });
    let provider = Arc::new(ScriptedProvider::always(&format!(
        "Sure! Here is the draft:\n```json\n{draft}\n```"
    )));
    let gw = gateway(provider, Arc::new(MemorySink::new()));

    let response = gw
        .request_default(
            OperationKind::GenerateDraft,
            &gw.input("Volunteered at the shelter"),
        )
        .await
        .unwrap();

    assert_eq!(response.value, draft);
    assert_eq!(response.items(Some("skills")).len(), 5);
    assert!(!response.was_truncated);
}

#[tokio::test]
async fn bullet_range_follows_input_detail() {
    let bullets: Vec<String> = (1..=7).map(|n| format!("Achievement {n}")).collect();
    let draft = json!({
        "title": "Community Volunteer",
        "bullet_points": bullets,
        "skills": ["Leadership", "Fundraising", "Planning", "Outreach", "Teamwork"],
        "questions": ["How many people?", "How long?", "What changed?"]
    });
    let provider = Arc::new(ScriptedProvider::always(&draft.to_string()));
    let gw = gateway(provider.clone(), Arc::new(MemorySink::new()));

    let brief = gw.input("Volunteered at the shelter");
    let short = gw
        .request_default(OperationKind::GenerateDraft, &brief)
        .await
        .unwrap();
    assert_eq!(short.items(Some("bullet_points")).len(), 5);
    assert!(short.was_truncated);

    // 180 words
    let detailed = gw.input("Volunteered at the shelter every weekend. ".repeat(30));
    let long = gw
        .request_default(OperationKind::GenerateDraft, &detailed)
        .await
        .unwrap();
    assert_eq!(long.items(Some("bullet_points")).len(), 7);
    assert!(!long.was_truncated);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn schema_override_replaces_builtin() {
    let provider = Arc::new(ScriptedProvider::always(r#"["a", "b", "c", "d"]"#));
    let gw = AiGateway::builder()
        .provider(provider)
        .schema(OperationKind::Improve, ResponseSchema::list(1, 2, 10))
        .build()
        .unwrap();

    let response = gw
        .request_default(OperationKind::Improve, &RequestInput::new("Led a team"))
        .await
        .unwrap();

    assert_eq!(response.value, json!(["a", "b"]));
    assert!(response.was_truncated);
}
