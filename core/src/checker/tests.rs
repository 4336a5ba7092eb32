//! Engine-level tests against a local HTTP fixture

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use super::HttpChecker;
use crate::config::{CheckConfig, CheckKind, CheckState};

// ============================================================================
// HTTP fixture
// ============================================================================

/// Minimal HTTP/1.1 server: answers every request with a fixed status and
/// body, optionally after a delay, and tracks hit and concurrency counts.
struct Fixture {
    addr: SocketAddr,
    hits: Arc<AtomicU32>,
    max_in_flight: Arc<AtomicU32>,
}

impl Fixture {
    async fn spawn(status: u16, body: &'static str, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicU32::new(0));
        let in_flight = Arc::new(AtomicU32::new(0));
        let max_in_flight = Arc::new(AtomicU32::new(0));

        let accept_hits = Arc::clone(&hits);
        let accept_in_flight = Arc::clone(&in_flight);
        let accept_max = Arc::clone(&max_in_flight);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let hits = Arc::clone(&accept_hits);
                let in_flight = Arc::clone(&accept_in_flight);
                let max_in_flight = Arc::clone(&accept_max);

                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let mut seen = Vec::new();
                    loop {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => {
                                seen.extend_from_slice(&buf[..n]);
                                if seen.windows(4).any(|w| w == b"\r\n\r\n") {
                                    break;
                                }
                            }
                        }
                    }

                    hits.fetch_add(1, Ordering::SeqCst);
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(current, Ordering::SeqCst);

                    tokio::time::sleep(delay).await;

                    let response = format!(
                        "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;

                    in_flight.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            hits,
            max_in_flight,
        }
    }

    fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_state(kind: CheckKind, json: serde_json::Value) -> CheckState {
    let config: CheckConfig = serde_json::from_value(json).unwrap();
    CheckState::resolve(Uuid::new_v4(), kind, &config).unwrap()
}

/// Poll a condition until it holds or the timeout elapses
async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_fixed_amount_executes_exact_count() {
    let fixture = Fixture::spawn(200, "ok", Duration::ZERO).await;
    let state = resolve_state(
        CheckKind::FixedAmount,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-299",
            "duration": 200,
            "numberOfRequests": 5,
            "maxConcurrent": 1
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    assert!(
        eventually(Duration::from_secs(5), || checker.counters().started() >= 5).await,
        "workers never reached 5 attempts"
    );
    assert!(
        eventually(Duration::from_secs(5), || checker
            .counters()
            .snapshot()
            .completed()
            >= 5)
        .await
    );
    checker.shutdown().await;

    let snapshot = checker.counters().snapshot();
    assert_eq!(snapshot.requested, 5);
    assert_eq!(snapshot.started, 5);
    assert_eq!(fixture.hits(), 5);
    assert!(checker.is_completed());

    let metrics = checker.drain_metrics().await;
    assert_eq!(metrics.len(), 5);
    for metric in &metrics {
        assert_eq!(metric.http_status(), Some("200"));
        assert!(metric.error().is_none());
        assert!(metric.value >= 0.0);
    }
}

#[tokio::test]
async fn test_single_request_fires_immediately() {
    let fixture = Fixture::spawn(200, "ok", Duration::ZERO).await;
    let state = resolve_state(
        CheckKind::FixedAmount,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-299",
            "duration": 60_000,
            "numberOfRequests": 1,
            "maxConcurrent": 1
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    assert!(
        eventually(Duration::from_secs(2), || checker.is_completed()).await,
        "single-request run never completed"
    );
    assert!(
        eventually(Duration::from_secs(2), || fixture.hits() == 1).await
    );

    // no second ticket arrives
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fixture.hits(), 1);
    assert_eq!(checker.counters().requested(), 1);

    checker.shutdown().await;
}

#[tokio::test]
async fn test_unexpected_status_counts_as_failed() {
    let fixture = Fixture::spawn(404, "gone", Duration::ZERO).await;
    let state = resolve_state(
        CheckKind::FixedAmount,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-299",
            "duration": 100,
            "numberOfRequests": 3,
            "maxConcurrent": 2
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    assert!(
        eventually(Duration::from_secs(5), || checker
            .counters()
            .snapshot()
            .completed()
            >= 3)
        .await
    );
    checker.shutdown().await;

    let snapshot = checker.counters().snapshot();
    assert_eq!(snapshot.failed, 3);
    assert_eq!(snapshot.success, 0);

    for metric in checker.drain_metrics().await {
        assert_eq!(metric.http_status(), Some("404"));
        assert_eq!(metric.tags.get("expected_http_status").unwrap(), "false");
    }
}

#[tokio::test]
async fn test_read_timeout_with_error_token_counts_as_success() {
    let fixture = Fixture::spawn(200, "late", Duration::from_millis(2000)).await;
    let state = resolve_state(
        CheckKind::FixedAmount,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "error",
            "duration": 250,
            "numberOfRequests": 3,
            "readTimeout": 50,
            "maxConcurrent": 3
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    assert!(
        eventually(Duration::from_secs(5), || checker
            .counters()
            .snapshot()
            .completed()
            >= 3)
        .await
    );
    checker.shutdown().await;

    let snapshot = checker.counters().snapshot();
    assert_eq!(snapshot.success, 3);
    assert_eq!(snapshot.failed, 0);

    let metrics = checker.drain_metrics().await;
    assert_eq!(metrics.len(), 3);
    for metric in &metrics {
        assert!(metric.error().is_some());
        assert!(metric.http_status().is_none());
        assert_eq!(metric.tags.get("expected_http_status").unwrap(), "true");
    }
}

#[tokio::test]
async fn test_body_mismatch_fails_verification() {
    let fixture = Fixture::spawn(200, "hello", Duration::ZERO).await;
    let state = resolve_state(
        CheckKind::FixedAmount,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200",
            "responsesContains": "world",
            "duration": 100,
            "numberOfRequests": 2,
            "maxConcurrent": 1
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    assert!(
        eventually(Duration::from_secs(5), || checker
            .counters()
            .snapshot()
            .completed()
            >= 2)
        .await
    );
    checker.shutdown().await;

    assert_eq!(checker.counters().snapshot().failed, 2);

    for metric in checker.drain_metrics().await {
        assert_eq!(metric.tags.get("expected_http_status").unwrap(), "true");
        assert_eq!(
            metric.tags.get("response_constraints_fulfilled").unwrap(),
            "false"
        );
    }
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_requests() {
    let fixture = Fixture::spawn(200, "slow", Duration::from_millis(500)).await;
    let state = resolve_state(
        CheckKind::Periodic,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-299",
            "duration": 60_000,
            "requestsPerSecond": 10,
            "maxConcurrent": 2
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    // let a couple of requests get in flight
    assert!(
        eventually(Duration::from_secs(2), || checker.counters().started() >= 1).await
    );

    let begun = tokio::time::Instant::now();
    checker.shutdown().await;
    assert!(
        begun.elapsed() < Duration::from_secs(3),
        "shutdown did not return promptly"
    );

    // cancelled in-flight requests are not failures and emit nothing
    let snapshot = checker.counters().snapshot();
    assert_eq!(snapshot.failed, 0);
    assert_eq!(snapshot.success, 0);
    assert!(checker.drain_metrics().await.is_empty());
}

#[tokio::test]
async fn test_backpressure_drops_ticks_not_requests() {
    let fixture = Fixture::spawn(200, "busy", Duration::from_millis(200)).await;
    let state = resolve_state(
        CheckKind::Periodic,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-299",
            "duration": 60_000,
            "requestsPerSecond": 50,
            "maxConcurrent": 1
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    tokio::time::sleep(Duration::from_millis(400)).await;
    checker.shutdown().await;

    let snapshot = checker.counters().snapshot();
    // an ideal 50 rps schedule would have issued ~20 tickets; with one busy
    // worker nearly all ticks must have been dropped
    assert!(snapshot.requested >= 1);
    assert!(
        snapshot.requested <= 5,
        "expected dropped ticks, got {} tickets",
        snapshot.requested
    );
    assert!(snapshot.started <= snapshot.requested);
}

#[tokio::test]
async fn test_max_concurrent_serializes_requests() {
    let fixture = Fixture::spawn(200, "ok", Duration::from_millis(50)).await;
    let state = resolve_state(
        CheckKind::Periodic,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-299",
            "duration": 60_000,
            "requestsPerSecond": 20,
            "maxConcurrent": 1
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    tokio::time::sleep(Duration::from_millis(500)).await;
    checker.shutdown().await;

    assert!(fixture.hits() >= 2, "expected several requests");
    assert_eq!(fixture.max_in_flight(), 1);
}

#[tokio::test]
async fn test_periodic_never_completes_on_its_own() {
    let fixture = Fixture::spawn(200, "ok", Duration::ZERO).await;
    let state = resolve_state(
        CheckKind::Periodic,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-299",
            "duration": 100,
            "requestsPerSecond": 10,
            "maxConcurrent": 2
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    // even past the configured duration the engine keeps going
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!checker.is_completed());

    checker.shutdown().await;
}

#[tokio::test]
async fn test_all_ok_scenario_metric_shape() {
    let fixture = Fixture::spawn(200, "this is a test response", Duration::ZERO).await;
    let state = resolve_state(
        CheckKind::FixedAmount,
        serde_json::json!({
            "url": fixture.url(),
            "statusCode": "200-209",
            "responsesContains": "test",
            "duration": 300,
            "numberOfRequests": 4,
            "maxConcurrent": 2
        }),
    );

    let checker = HttpChecker::new(state).unwrap();
    checker.start();

    assert!(
        eventually(Duration::from_secs(5), || checker
            .counters()
            .snapshot()
            .completed()
            >= 4)
        .await
    );
    checker.shutdown().await;

    let snapshot = checker.counters().snapshot();
    assert_eq!(snapshot.success, 4);
    assert_eq!(snapshot.failed, 0);

    let url = fixture.url();
    for metric in checker.drain_metrics().await {
        assert_eq!(metric.name, "response_time");
        assert_eq!(metric.http_status(), Some("200"));
        assert_eq!(metric.tags.get("url").unwrap(), &url);
        assert_eq!(metric.tags.get("expected_http_status").unwrap(), "true");
        assert_eq!(
            metric.tags.get("response_constraints_fulfilled").unwrap(),
            "true"
        );
        assert!(metric.value >= 0.0);
    }
}
