//! Health Checking Integration Tests
//!
//! Periodic checkers run on tokio's paused clock, so the multi-second
//! schedules below complete instantly. HTTP probes run against wiremock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use joblog_core::health::{probe_fn, HealthState, ProbeChecker};
use joblog_core::{Checker, HealthAggregator, HealthError, HttpProbe, PeriodicChecker};

#[tokio::test(start_paused = true)]
async fn test_periodic_checker_latches_results() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let probe = probe_fn(move || {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            if call == 0 {
                Ok(())
            } else {
                Err(HealthError::Failed("unhealthy".into()))
            }
        }
    });

    let cancel = CancellationToken::new();
    let checker = PeriodicChecker::spawn("registry", probe, Duration::from_secs(1), cancel.clone());

    let at_start = checker.check().await.unwrap_err();
    assert_eq!(at_start.to_string(), "unknown status");

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(checker.check().await, Ok(()));

    tokio::time::sleep(Duration::from_secs(3)).await;
    let later = checker.check().await.unwrap_err();
    assert_eq!(later.to_string(), "unhealthy");

    cancel.cancel();
}

#[tokio::test]
async fn test_http_probe_expected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = format!("{}/health", server.uri());

    let ok = HttpProbe::new(Client::new(), &url).with_expected_status(200);
    assert_eq!(ok.probe().await, Ok(()));

    let wrong = HttpProbe::new(Client::new(), &url).with_expected_status(401);
    assert!(wrong.probe().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_aggregator_timeout() {
    let fast = Arc::new(ProbeChecker::new(probe_fn(|| async { Ok(()) })));
    let slow = Arc::new(ProbeChecker::new(probe_fn(|| async {
        tokio::time::sleep(Duration::from_secs(120)).await;
        Ok(())
    })));

    let mut aggregator = HealthAggregator::new().with_timeout(Duration::from_secs(1));
    aggregator.add("slow", slow as Arc<dyn Checker>);
    aggregator.add("fast", fast as Arc<dyn Checker>);

    let status = aggregator.check_all().await;

    assert_eq!(status.status, HealthState::Unhealthy);
    assert_eq!(status.components.len(), 2);
    assert_eq!(status.components[0].name, "fast");
    assert_eq!(status.components[0].status, HealthState::Healthy);
    assert_eq!(status.components[1].name, "slow");
    assert_eq!(status.components[1].status, HealthState::Unhealthy);
    assert_eq!(
        status.components[1].error.as_deref(),
        Some("failed to check the health status: timeout")
    );
}

#[tokio::test]
async fn test_aggregator_over_http_and_periodic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2.0/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let never_probed = PeriodicChecker::spawn(
        "pending",
        probe_fn(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }),
        Duration::from_secs(60),
        cancel.clone(),
    );

    let mut aggregator = HealthAggregator::new();
    aggregator.add(
        "core",
        Arc::new(HttpProbe::new(Client::new(), format!("{}/api/v2.0/ping", server.uri()))),
    );
    aggregator.add("jobservice", Arc::new(never_probed));

    let status = aggregator.check_all().await;
    assert!(!status.is_healthy());
    assert_eq!(status.components[0].status, HealthState::Healthy);
    assert_eq!(status.components[1].error.as_deref(), Some("unknown status"));

    cancel.cancel();
}
