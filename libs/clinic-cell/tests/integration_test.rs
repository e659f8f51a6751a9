use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clinic_cell::create_clinic_router;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn create_test_app(config: &AppConfig) -> Router {
    create_clinic_router(Arc::new(config.clone()))
}

fn test_config(mock_uri: &str) -> (AppConfig, String) {
    let config = TestConfig::with_mock_server(mock_uri).to_app_config();
    let user = TestUser::default();
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    (config, token)
}

#[tokio::test]
async fn test_get_booking_restrictions_success() {
    let mock_server = MockServer::start().await;
    let (config, token) = test_config(&mock_server.uri());
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(
                clinic_id,
                "康和復健科診所",
                json!({"mode": "minimum_hours", "minimum_booking_hours_ahead": 48}),
            )
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config).await;
    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/booking-restrictions", clinic_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["minimum_booking_hours_ahead"], json!(48));
}

#[tokio::test]
async fn test_update_booking_restrictions_merges_partial_patch() {
    let mock_server = MockServer::start().await;
    let (config, token) = test_config(&mock_server.uri());
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(
                clinic_id,
                "康和復健科診所",
                json!({"mode": "minimum_hours", "minimum_booking_hours_ahead": 48}),
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(clinic_id, "康和復健科診所", json!({}))
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config).await;
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/booking-restrictions", clinic_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"mode": "deadline", "deadline_time_day_before": "08:00"}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["mode"], json!("deadline"));
    assert_eq!(parsed["deadline_time_day_before"], json!("08:00"));
    // Field absent from the patch survives the merge
    assert_eq!(parsed["minimum_booking_hours_ahead"], json!(48));
}

#[tokio::test]
async fn test_booking_restrictions_unauthorized_without_token() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(&config).await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/booking-restrictions", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_notification_settings_merges_partial_patch() {
    let mock_server = MockServer::start().await;
    let (config, token) = test_config(&mock_server.uri());
    let clinic_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let association = MockSupabaseResponses::association_row(
        clinic_id,
        user_id,
        &["practitioner"],
        Some("U1234567890abcdef"),
        json!({"daily_reminder_enabled": true, "daily_reminder_time": "09:00"}),
    );
    let association_id = association["id"].as_str().unwrap().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_clinic_associations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([association])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/user_clinic_associations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": association_id}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config).await;
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/associations/{}/notification-settings", association_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"auto_assigned_notification_mode": "immediate"}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["auto_assigned_notification_mode"], json!("immediate"));
    assert_eq!(parsed["daily_reminder_time"], json!("09:00"));
}
