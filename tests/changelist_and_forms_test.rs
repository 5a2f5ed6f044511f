//! Tests for the device changelist and the add/change endpoints

use axum::Router;
use otp_admin::admin::AdminSite;
use otp_admin::admin::totp::{self, TotpDeviceAdmin};
use otp_admin::testing::{self, fixtures};
use otp_admin::AdminConfig;
use serde_json::{Value, json};
use std::sync::Arc;

const CHANGELIST: &str = "/admin/otp_totp/totpdevice/";

async fn app(hide_sensitive_data: bool) -> Router {
    let site = Arc::new(AdminSite::new(AdminConfig {
        hide_sensitive_data,
        ..Default::default()
    }));
    let store = Arc::new(fixtures::seeded_store().await);
    totp::register(&site, TotpDeviceAdmin::new(store).unwrap());
    site.router()
}

async fn changelist(app: Router, query: &[(&str, &str)]) -> Value {
    testing::get(app, CHANGELIST)
        .with_query(query)
        .as_principal(fixtures::viewer())
        .execute()
        .await
        .assert_ok()
        .assert_json()
        .json()
        .await
}

fn column_names(body: &Value) -> Vec<String> {
    body["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_changelist_columns_follow_setting() {
    let shown = changelist(app(false).await, &[]).await;
    assert_eq!(column_names(&shown).last().unwrap(), "qrcode_link");
    assert_eq!(shown["columns"][5]["label"], "QR Code");
    assert_eq!(
        shown["rows"][1]["qrcode_link"],
        r#"<a href="/admin/otp_totp/totpdevice/1/config/">qrcode</a>"#
    );

    let hidden = changelist(app(true).await, &[]).await;
    assert!(!column_names(&hidden).contains(&"qrcode_link".to_string()));
    assert!(hidden["rows"][0].get("qrcode_link").is_none());
}

#[tokio::test]
async fn test_changelist_lists_newest_first() {
    let body = changelist(app(false).await, &[]).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["total_pages"], 1);
    assert_eq!(body["rows"][0]["user"], "bob");
    assert_eq!(body["rows"][1]["user"], "alice");
    assert_eq!(body["search_help_text"], "Search by username or email.");
}

#[tokio::test]
async fn test_changelist_search_and_filters() {
    let body = changelist(app(false).await, &[("q", "BOB")]).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["rows"][0]["name"], "bob tablet");

    let body = changelist(app(false).await, &[("q", "alice@example")]).await;
    assert_eq!(body["total"], 1);

    let body = changelist(app(false).await, &[("confirmed", "0")]).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["rows"][0]["confirmed"], false);

    let body = changelist(app(false).await, &[("created_at", "past_seven_days")]).await;
    assert_eq!(body["total"], 1);

    let body = changelist(app(false).await, &[("last_used_at", "has_date")]).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_changelist_search_by_full_email() {
    let store = fixtures::seeded_store().await;
    let carol = fixtures::random_user(3);
    store.add_user(carol.clone()).await;
    store
        .insert(fixtures::device_builder(3).user(carol.clone()).build())
        .await;

    let site = Arc::new(AdminSite::new(AdminConfig::default()));
    totp::register(&site, TotpDeviceAdmin::new(Arc::new(store)).unwrap());

    let body = changelist(site.router(), &[("q", &carol.email)]).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["rows"][0]["user"], carol.username.as_str());
}

#[tokio::test]
async fn test_changelist_rejects_unknown_filter() {
    testing::get(app(false).await, CHANGELIST)
        .with_query(&[("created_at", "someday")])
        .as_principal(fixtures::viewer())
        .execute()
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_changelist_requires_permission() {
    testing::get(app(false).await, CHANGELIST)
        .as_principal(fixtures::staff())
        .execute()
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_change_form_hides_key() {
    let body: Value = testing::get(app(true).await, "/admin/otp_totp/totpdevice/1/change/")
        .as_principal(fixtures::viewer())
        .execute()
        .await
        .assert_ok()
        .json()
        .await;

    assert!(body["values"].get("key").is_none());
    assert!(body["values"].get("qrcode_link").is_none());
    assert_eq!(body["values"]["step"], 30);
    assert_eq!(body["has_change_permission"], false);
}

#[tokio::test]
async fn test_change_form_shows_key_and_qrcode() {
    let body: Value = testing::get(app(false).await, "/admin/otp_totp/totpdevice/1/change/")
        .as_principal(fixtures::superuser())
        .execute()
        .await
        .assert_ok()
        .json()
        .await;

    assert_eq!(body["values"]["key"], fixtures::RFC_KEY);
    assert_eq!(
        body["values"]["qrcode_link"],
        r#"<a href="/admin/otp_totp/totpdevice/1/config/">qrcode</a>"#
    );
    let sections = body["fieldsets"].as_array().unwrap();
    assert_eq!(sections.len(), 6);
    assert_eq!(sections[5]["name"], Value::Null);
}

#[tokio::test]
async fn test_add_form_always_shows_key() {
    let body: Value = testing::get(app(true).await, "/admin/otp_totp/totpdevice/add/")
        .as_principal(fixtures::superuser())
        .execute()
        .await
        .assert_ok()
        .json()
        .await;

    let fields: Vec<&str> = body["fieldsets"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|set| set["fields"].as_array().unwrap().iter())
        .map(|f| f.as_str().unwrap())
        .collect();
    assert!(fields.contains(&"key"));
    assert_eq!(body["initial"]["key"].as_str().unwrap().len(), 40);
    assert_eq!(body["options"]["radio_fields"][0]["field"], "digits");
}

#[tokio::test]
async fn test_add_device() {
    let app = app(false).await;

    let body: Value = testing::post(app.clone(), "/admin/otp_totp/totpdevice/add/")
        .as_principal(fixtures::superuser())
        .json_body(&json!({ "user": 2, "name": "bob laptop", "digits": 8 }))
        .execute()
        .await
        .assert_created()
        .json()
        .await;
    assert_eq!(body["id"], 3);
    assert_eq!(body["values"]["digits"], 8);

    let list = changelist(app, &[("q", "bob")]).await;
    assert_eq!(list["total"], 2);
}

#[tokio::test]
async fn test_add_device_validation_and_permission() {
    let app = app(false).await;

    let body: Value = testing::post(app.clone(), "/admin/otp_totp/totpdevice/add/")
        .as_principal(fixtures::superuser())
        .json_body(&json!({ "user": 1, "name": "", "digits": 7 }))
        .execute()
        .await
        .assert_bad_request()
        .json()
        .await;
    assert!(body["field_errors"]["name"].is_array());
    assert!(body["field_errors"]["digits"].is_array());

    testing::post(app, "/admin/otp_totp/totpdevice/add/")
        .as_principal(fixtures::viewer())
        .json_body(&json!({ "user": 1, "name": "phone" }))
        .execute()
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_change_device() {
    let app = app(false).await;

    testing::post(app.clone(), "/admin/otp_totp/totpdevice/1/change/")
        .as_principal(fixtures::editor())
        .json_body(&json!({ "name": "alice work phone", "tolerance": 2 }))
        .execute()
        .await
        .assert_ok();

    let body: Value = testing::get(app, "/admin/otp_totp/totpdevice/1/change/")
        .as_principal(fixtures::editor())
        .execute()
        .await
        .assert_ok()
        .json()
        .await;
    assert_eq!(body["values"]["name"], "alice work phone");
    assert_eq!(body["values"]["tolerance"], 2);
}

#[tokio::test]
async fn test_change_key_rejected_when_hidden() {
    testing::post(app(true).await, "/admin/otp_totp/totpdevice/1/change/")
        .as_principal(fixtures::superuser())
        .json_body(&json!({ "key": "00112233" }))
        .execute()
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_change_requires_change_permission() {
    testing::post(app(false).await, "/admin/otp_totp/totpdevice/1/change/")
        .as_principal(fixtures::viewer())
        .json_body(&json!({ "name": "renamed" }))
        .execute()
        .await
        .assert_forbidden();
}
