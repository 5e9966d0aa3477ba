//! Forgot/reset password flow integration tests.

mod common;

use akibeks::audit::AuditAction;
use common::{TestApp, TEST_PASSWORD};
use serde_json::{json, Value};
use serial_test::serial;

const NEW_PASSWORD: &str = "N3w$ecret!";

async fn request_reset(app: &TestApp, email: &str) -> Value {
    let response = app
        .post_public("/auth/forgot-password", json!({ "email": email }))
        .await;
    assert_status!(response, 200);
    response.json().await.unwrap()
}

#[tokio::test]
#[serial]
async fn forgot_password_does_not_reveal_unknown_emails() {
    let app = TestApp::spawn().await;
    let user = app.create_verified_user().await;

    let known = request_reset(&app, &user.email).await;
    let unknown = request_reset(&app, "nobody@example.com").await;

    assert_eq!(known["message"], unknown["message"]);
    assert!(known["data"]["resetToken"].as_str().is_some());
    assert!(unknown["data"].get("resetToken").is_none());
}

#[tokio::test]
#[serial]
async fn reset_changes_password_and_ends_sessions() {
    let app = TestApp::spawn().await;
    let user = app.create_verified_user().await;
    let body = request_reset(&app, &user.email).await;
    let token = body["data"]["resetToken"].as_str().unwrap();

    let response = app
        .post_public(
            "/auth/reset-password",
            json!({ "token": token, "password": NEW_PASSWORD }),
        )
        .await;
    assert_status!(response, 200);

    assert_status!(app.login(&user.email, TEST_PASSWORD).await, 401);
    assert_status!(app.login(&user.email, NEW_PASSWORD).await, 200);

    let replay = app
        .post_public(
            "/auth/refresh",
            json!({ "refreshToken": user.refresh_token }),
        )
        .await;
    assert_status!(replay, 401);

    let audit = app.store.list_audit(0, 50).unwrap();
    assert!(audit
        .items
        .iter()
        .any(|e| e.action == AuditAction::PasswordReset.as_str() && e.resource_id.as_deref() == Some(user.id.as_str())));
}

#[tokio::test]
#[serial]
async fn reset_token_is_single_use() {
    let app = TestApp::spawn().await;
    let user = app.create_verified_user().await;
    let body = request_reset(&app, &user.email).await;
    let token = body["data"]["resetToken"].as_str().unwrap();

    let payload = json!({ "token": token, "password": NEW_PASSWORD });
    assert_status!(app.post_public("/auth/reset-password", payload.clone()).await, 200);

    let second = app.post_public("/auth/reset-password", payload).await;
    assert_status!(second, 400);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_RESET_TOKEN");
}

#[tokio::test]
#[serial]
async fn reset_enforces_password_policy() {
    let app = TestApp::spawn().await;
    let user = app.create_verified_user().await;
    let body = request_reset(&app, &user.email).await;
    let token = body["data"]["resetToken"].as_str().unwrap();

    let response = app
        .post_public(
            "/auth/reset-password",
            json!({ "token": token, "password": "alllowercase" }),
        )
        .await;

    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PASSWORD_POLICY_VIOLATION");

    assert_status!(app.login(&user.email, TEST_PASSWORD).await, 200);
}

#[tokio::test]
#[serial]
async fn reset_with_unknown_token_fails() {
    let app = TestApp::spawn().await;

    let response = app
        .post_public(
            "/auth/reset-password",
            json!({ "token": "not-a-real-token", "password": NEW_PASSWORD }),
        )
        .await;

    assert_status!(response, 400);
}
