//! Integration tests for per-IP rate limiting.

mod common;

use akibeks::Config;
use common::TestApp;
use reqwest::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;

fn limited_config(requests_per_minute: u32) -> Config {
    let mut config = Config::default_for_testing();
    config.security.rate_limiting_enabled = true;
    config.security.rate_limit_requests_per_minute = requests_per_minute;
    config
}

#[tokio::test]
#[serial]
async fn disabled_limiter_never_rejects() {
    let app = TestApp::spawn().await;

    for _ in 0..30 {
        assert_status!(app.get_public("/health").await, 200);
    }
}

#[tokio::test]
#[serial]
async fn global_limit_returns_429_with_retry_after() {
    let app = TestApp::spawn_with(limited_config(10)).await;

    let mut rejected = None;
    for _ in 0..20 {
        let response = app.get_public("/health").await;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            rejected = Some(response);
            break;
        }
    }

    let response = rejected.expect("limit was never reached");
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "RATE_LIMITED");
}

#[tokio::test]
#[serial]
async fn limited_responses_advertise_the_limit() {
    let app = TestApp::spawn_with(limited_config(100)).await;

    let response = app.get_public("/health").await;

    assert_status!(response, 200);
    assert_eq!(response.headers()["x-ratelimit-limit"], "100");
}

#[tokio::test]
#[serial]
async fn auth_endpoints_have_stricter_limits() {
    let app = TestApp::spawn_with(limited_config(1000)).await;

    let mut statuses = Vec::new();
    for i in 0..15 {
        let response = app
            .post_public(
                "/auth/login",
                json!({
                    "email": format!("nobody{}@example.com", i),
                    "password": "Wr0ng$password"
                }),
            )
            .await;
        statuses.push(response.status());
    }

    assert_eq!(statuses[0], StatusCode::UNAUTHORIZED);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));

    // Public reads are still under the generous global budget.
    assert_status!(app.get_public("/services").await, 200);
}
