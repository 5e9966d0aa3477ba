//! Admin surface: role checks, status workflows, quotations, publishing and
//! the audit trail.

mod common;

use akibeks::models::{
    new_id, now, quotation_number, BlogPost, BlogStatus, Quotation, QuotationStatus,
};
use rust_decimal::Decimal;
use common::{quote_payload, TestApp};
use serde_json::{json, Value};
use serial_test::serial;

async fn submit_quote(app: &TestApp) -> String {
    let response = app.post_public("/quote-requests", quote_payload()).await;
    assert_status!(response, 201);
    let body: Value = response.json().await.unwrap();
    body["data"]["id"].as_str().unwrap().to_string()
}

fn draft_post(app: &TestApp) -> String {
    let ts = now();
    let post = BlogPost {
        id: new_id(),
        title: "Choosing roofing for the long rains".to_string(),
        slug: "roofing-long-rains".to_string(),
        excerpt: None,
        content: "Clay tiles, iron sheets and stone-coated steel compared.".to_string(),
        status: BlogStatus::Draft,
        author_id: None,
        published_at: None,
        created_at: ts,
        updated_at: ts,
    };
    app.store.insert_blog_post(&post).unwrap();
    post.id
}

// ============================================================================
// Access control
// ============================================================================

#[tokio::test]
#[serial]
async fn expired_admin_token_is_rejected() {
    let mut config = akibeks::Config::default_for_testing();
    config.jwt.access_token_expiry_secs = 1;
    let app = TestApp::spawn_with(config).await;
    let admin = app.create_admin().await;

    let fresh = app.get("/admin/verify", &admin.access_token).await;
    assert_status!(fresh, 200);

    tokio::time::sleep(std::time::Duration::from_millis(2_100)).await;

    let response = app.get("/admin/verify", &admin.access_token).await;
    assert_status!(response, 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
#[serial]
async fn admin_routes_require_a_token() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/admin/submissions").await;

    assert_status!(response, 401);
}

#[tokio::test]
#[serial]
async fn admin_routes_reject_regular_users() {
    let app = TestApp::spawn().await;
    let user = app.create_verified_user().await;

    let response = app.get("/admin/verify", &user.access_token).await;

    assert_status!(response, 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
#[serial]
async fn verify_returns_admin_claims() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;

    let response = app.get("/admin/verify", &admin.access_token).await;

    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["role"], "admin");
    assert_eq!(body["data"]["sub"], admin.id);
}

// ============================================================================
// Submissions
// ============================================================================

#[tokio::test]
#[serial]
async fn submissions_are_listed_and_filtered() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let first = submit_quote(&app).await;
    submit_quote(&app).await;

    app.put(
        &format!("/admin/submissions/{}/status", first),
        &admin.access_token,
        json!({ "status": "contacted" }),
    )
    .await;

    let all: Value = app
        .get("/admin/submissions?page=1&per_page=10", &admin.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all["data"]["pagination"]["totalCount"], 2);
    assert_eq!(all["data"]["items"].as_array().unwrap().len(), 2);

    let new_only: Value = app
        .get("/admin/submissions?status=new", &admin.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(new_only["data"]["pagination"]["totalCount"], 1);
    assert_ne!(new_only["data"]["items"][0]["id"], first);
}

#[tokio::test]
#[serial]
async fn submission_status_only_moves_forward() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let id = submit_quote(&app).await;
    let path = format!("/admin/submissions/{}/status", id);

    let contacted = app
        .put(&path, &admin.access_token, json!({ "status": "contacted" }))
        .await;
    assert_status!(contacted, 200);
    let body: Value = contacted.json().await.unwrap();
    let responded_at = body["data"]["respondedAt"].clone();
    assert!(responded_at.is_string());

    let back = app
        .put(&path, &admin.access_token, json!({ "status": "new" }))
        .await;
    assert_status!(back, 422);
    let body: Value = back.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");

    let closed = app
        .put(&path, &admin.access_token, json!({ "status": "closed" }))
        .await;
    assert_status!(closed, 200);
    let body: Value = closed.json().await.unwrap();
    assert_eq!(body["data"]["respondedAt"], responded_at);
}

#[tokio::test]
#[serial]
async fn unknown_submission_returns_404() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;

    let response = app
        .put(
            "/admin/submissions/does-not-exist/status",
            &admin.access_token,
            json!({ "status": "contacted" }),
        )
        .await;

    assert_status!(response, 404);
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
#[serial]
async fn suspended_user_cannot_log_in() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let user = app.create_verified_user().await;

    let response = app
        .put(
            &format!("/admin/users/{}/status", user.id),
            &admin.access_token,
            json!({ "status": "suspended" }),
        )
        .await;
    assert_status!(response, 200);

    let login = app.login(&user.email, &user.password).await;
    assert_status!(login, 401);
    let body: Value = login.json().await.unwrap();
    assert_eq!(body["code"], "ACCOUNT_SUSPENDED");

    let reinstated = app
        .put(
            &format!("/admin/users/{}/status", user.id),
            &admin.access_token,
            json!({ "status": "active" }),
        )
        .await;
    assert_status!(reinstated, 200);
    assert_status!(app.login(&user.email, &user.password).await, 200);
}

#[tokio::test]
#[serial]
async fn admin_cannot_suspend_self() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;

    let response = app
        .put(
            &format!("/admin/users/{}/status", admin.id),
            &admin.access_token,
            json!({ "status": "suspended" }),
        )
        .await;

    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "CANNOT_SUSPEND_SELF");
}

#[tokio::test]
#[serial]
async fn users_are_listed_without_secrets() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    app.create_verified_user().await;

    let body: Value = app
        .get("/admin/users", &admin.access_token)
        .await
        .json()
        .await
        .unwrap();

    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|u| u.get("passwordHash").is_none()));
}

// ============================================================================
// Projects, quotations and content
// ============================================================================

#[tokio::test]
#[serial]
async fn project_status_transitions_are_checked() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let completed = app
        .store
        .find_project_by_slug("karen-family-residence")
        .unwrap()
        .unwrap();

    let response = app
        .put(
            &format!("/admin/projects/{}/status", completed.id),
            &admin.access_token,
            json!({ "status": "planning" }),
        )
        .await;
    assert_status!(response, 422);

    let planning = app
        .store
        .list_projects(0, 100)
        .unwrap()
        .items
        .into_iter()
        .find(|p| p.status.as_str() == "planning")
        .unwrap();
    let response = app
        .put(
            &format!("/admin/projects/{}/status", planning.id),
            &admin.access_token,
            json!({ "status": "in_progress" }),
        )
        .await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "in_progress");
}

#[tokio::test]
#[serial]
async fn quotation_totals_and_numbering() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let payload = json!({
        "clientName": "Jane Wanjiru",
        "clientEmail": "Jane@Example.com",
        "items": [
            { "description": "Excavation works", "quantity": "2", "unitPrice": "15000" },
            { "description": "Foundation", "quantity": "1", "unitPrice": "70000" }
        ],
        "taxRate": "16",
        "discount": "1000"
    });

    let first = app
        .post("/admin/quotations", &admin.access_token, payload.clone())
        .await;
    assert_status!(first, 201);
    let body: Value = first.json().await.unwrap();
    let totals = &body["data"]["totals"];
    let amount = |v: &Value| v.as_str().unwrap().parse::<f64>().unwrap();
    assert_eq!(amount(&totals["subtotal"]), 100000.0);
    assert_eq!(amount(&totals["taxAmount"]), 16000.0);
    assert_eq!(amount(&totals["total"]), 115000.0);

    let number = body["data"]["quotation"]["quotationNumber"].as_str().unwrap();
    assert!(number.starts_with("QT-"));
    assert!(number.ends_with("-0001"));
    assert_eq!(body["data"]["quotation"]["status"], "draft");
    assert_eq!(body["data"]["quotation"]["clientEmail"], "jane@example.com");

    let second: Value = app
        .post("/admin/quotations", &admin.access_token, payload)
        .await
        .json()
        .await
        .unwrap();
    let number = second["data"]["quotation"]["quotationNumber"].as_str().unwrap();
    assert!(number.ends_with("-0002"));
}

#[tokio::test]
#[serial]
async fn quotation_numbering_continues_past_gaps() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let ts = now();
    app.store
        .insert_quotation(&Quotation {
            id: new_id(),
            quotation_number: quotation_number(ts.date(), 2),
            client_name: "Earlier client".to_string(),
            client_email: "earlier@example.com".to_string(),
            project_id: None,
            items: json!([]),
            subtotal: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            status: QuotationStatus::Draft,
            valid_until: None,
            created_by: None,
            created_at: ts,
            updated_at: ts,
        })
        .unwrap();

    let response = app
        .post(
            "/admin/quotations",
            &admin.access_token,
            json!({
                "clientName": "Jane Wanjiru",
                "clientEmail": "jane@example.com",
                "items": [
                    { "description": "Site survey", "quantity": "1", "unitPrice": "25000" }
                ],
                "taxRate": "16",
                "discount": "0"
            }),
        )
        .await;

    assert_status!(response, 201);
    let body: Value = response.json().await.unwrap();
    let number = body["data"]["quotation"]["quotationNumber"].as_str().unwrap();
    assert_eq!(number, quotation_number(ts.date(), 3));
}

#[tokio::test]
#[serial]
async fn quotation_without_items_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;

    let response = app
        .post(
            "/admin/quotations",
            &admin.access_token,
            json!({ "clientName": "Jane", "clientEmail": "jane@example.com", "items": [] }),
        )
        .await;

    assert_status!(response, 400);
}

#[tokio::test]
#[serial]
async fn republishing_keeps_the_first_publication_time() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let id = draft_post(&app);
    let path = format!("/admin/blog/{}/publish", id);

    let first = app.post(&path, &admin.access_token, json!({})).await;
    assert_status!(first, 200);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["data"]["status"], "published");

    let second: Value = app
        .post(&path, &admin.access_token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["data"]["publishedAt"], first["data"]["publishedAt"]);

    let public: Value = app.get_public("/blog").await.json().await.unwrap();
    assert_eq!(public["data"]["pagination"]["totalCount"], 1);
}

// ============================================================================
// Audit trail
// ============================================================================

#[tokio::test]
#[serial]
async fn admin_actions_are_audited_with_actor() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let id = submit_quote(&app).await;

    app.put(
        &format!("/admin/submissions/{}/status", id),
        &admin.access_token,
        json!({ "status": "responded" }),
    )
    .await;

    let body: Value = app
        .get("/admin/audit-logs", &admin.access_token)
        .await
        .json()
        .await
        .unwrap();
    let latest = &body["data"]["items"][0];
    assert_eq!(latest["action"], "submission.status_changed");
    assert_eq!(latest["userId"], admin.id);
    assert_eq!(latest["resourceId"], id);
    assert_eq!(latest["details"]["to"], "responded");
    assert_eq!(latest["ipAddress"], "127.0.0.1");
}
