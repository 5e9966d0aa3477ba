//! Read-only marketing endpoints.

mod common;

use akibeks::seed::{PROJECTS, SERVICES};
use common::TestApp;
use serde_json::Value;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn services_are_listed_in_display_order() {
    let app = TestApp::spawn().await;
    app.seed();

    let body: Value = app.get_public("/services").await.json().await.unwrap();

    let services = body["data"].as_array().unwrap();
    assert_eq!(services.len(), SERVICES.len());
    assert_eq!(services[0]["slug"], SERVICES[0].slug);
    assert!(services.iter().all(|s| s["isActive"] == true));
}

#[tokio::test]
#[serial]
async fn projects_are_paginated() {
    let app = TestApp::spawn().await;
    app.seed();

    let body: Value = app
        .get_public("/projects?page=1&per_page=2")
        .await
        .json()
        .await
        .unwrap();

    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["totalCount"], PROJECTS.len() as i64);
    assert_eq!(pagination["perPage"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(pagination["hasNext"], PROJECTS.len() > 2);
}

#[tokio::test]
#[serial]
async fn blog_hides_drafts() {
    let app = TestApp::spawn().await;

    let body: Value = app.get_public("/blog").await.json().await.unwrap();

    assert_eq!(body["data"]["pagination"]["totalCount"], 0);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn settings_are_a_flat_map() {
    let app = TestApp::spawn().await;

    let body: Value = app.get_public("/settings").await.json().await.unwrap();

    let settings = body["data"].as_object().unwrap();
    assert!(settings.contains_key("company_name"));
    assert!(settings.values().all(Value::is_string));
}
