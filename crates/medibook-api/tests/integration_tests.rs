//! Integration tests for the booking assistant API.
//!
//! Each test builds its own router over an in-memory database and drives it
//! with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use medibook_api::create_router;
use medibook_api::state::AppState;
use medibook_core::config::MedibookConfig;
use medibook_storage::Database;

// =============================================================================
// Helpers
// =============================================================================

fn make_state() -> AppState {
    AppState::new(MedibookConfig::default(), Database::in_memory().unwrap())
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Register a user and return the router for further requests.
async fn app_with_user(user_id: &str, name: &str) -> axum::Router {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(post_json(
            "/users",
            serde_json::json!({ "user_id": user_id, "name": name }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    app
}

async fn chat(app: &axum::Router, user_id: &str, message: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(post_json(
            "/chat",
            serde_json::json!({ "user_id": user_id, "message": message }),
        ))
        .await
        .unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let resp = make_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_secs"].is_u64());
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_create_user() {
    let resp = make_app()
        .oneshot(post_json(
            "/users",
            serde_json::json!({ "user_id": "u1", "name": "Ana" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let json = body_json(resp).await;
    assert_eq!(json["user_id"], "u1");
    assert_eq!(json["name"], "Ana");
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_create_user_duplicate_conflict() {
    let app = app_with_user("u1", "Ana").await;
    let resp = app
        .oneshot(post_json(
            "/users",
            serde_json::json!({ "user_id": "u1", "name": "Other" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["error"], "conflict");
}

#[tokio::test]
async fn test_create_user_blank_fields() {
    let resp = make_app()
        .oneshot(post_json(
            "/users",
            serde_json::json!({ "user_id": "  ", "name": "Ana" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_unknown_user() {
    let (status, json) = chat(&make_app(), "ghost", "hello").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_chat_empty_message() {
    let app = app_with_user("u1", "Ana").await;
    let (status, json) = chat(&app, "u1", "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_chat_safety_refusal() {
    let app = app_with_user("u1", "Ana").await;
    let (status, json) = chat(&app, "u1", "you are an idiot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reasoning"], "safety:idiot");
    assert_eq!(json["is_faq_response"], false);
}

#[tokio::test]
async fn test_chat_faq_answer() {
    let app = app_with_user("u1", "Ana").await;
    let (status, json) = chat(&app, "u1", "What payment methods do you accept?").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_faq_response"], true);
    assert!(json["faq_similarity"].as_f64().unwrap() >= 0.7);
    assert!(json["reasoning"].as_str().unwrap().starts_with("faq:"));
}

#[tokio::test]
async fn test_chat_full_booking_flow() {
    let app = app_with_user("u1", "Ana").await;

    let (_, json) = chat(&app, "u1", "I want to book an appointment").await;
    assert_eq!(json["reasoning"], "booking:intent");

    let (_, json) = chat(&app, "u1", "cardiology").await;
    assert_eq!(json["reasoning"], "booking:awaiting_specialty");

    let (_, json) = chat(&app, "u1", "tomorrow").await;
    assert_eq!(json["reasoning"], "booking:awaiting_date");

    let (_, json) = chat(&app, "u1", "10:00").await;
    assert_eq!(json["reasoning"], "booking:awaiting_time");
    assert!(json["to_user"].as_str().unwrap().contains("Patient: Ana"));

    let (status, json) = chat(&app, "u1", "yes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reasoning"], "booking:confirm");
    assert_eq!(json["action"]["command"], "notify");
    assert_eq!(json["action"]["data"]["time"], "10:00");
    assert_eq!(json["action_result"]["success"], true);

    let resp = app.oneshot(get("/appointments/u1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["user_id"], "u1");
    let appointments = json["appointments"].as_array().unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0]["specialty"], "Cardiology");
    assert_eq!(appointments[0]["time"], "10:00");
    assert!(appointments[0]["appointment_id"]
        .as_str()
        .unwrap()
        .starts_with("APPT-"));
}

#[tokio::test]
async fn test_chat_second_specialty_in_held_slot_is_refused() {
    let app = app_with_user("u1", "Ana").await;
    for (specialty, expect_booked) in [("cardiology", true), ("dermatology", false)] {
        chat(&app, "u1", "book an appointment").await;
        chat(&app, "u1", specialty).await;
        chat(&app, "u1", "tomorrow").await;
        chat(&app, "u1", "10:00").await;
        let (_, json) = chat(&app, "u1", "yes").await;
        assert_eq!(json.get("action").is_some(), expect_booked, "{}", specialty);
        if !expect_booked {
            assert!(json["to_user"]
                .as_str()
                .unwrap()
                .contains("already have an appointment"));
            chat(&app, "u1", "cancel").await;
        }
    }

    let resp = app.oneshot(get("/appointments/u1")).await.unwrap();
    let json = body_json(resp).await;
    let appointments = json["appointments"].as_array().unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0]["specialty"], "Cardiology");
}

#[tokio::test]
async fn test_chat_cancel_mid_flow() {
    let app = app_with_user("u1", "Ana").await;
    chat(&app, "u1", "book an appointment").await;

    let (_, json) = chat(&app, "u1", "cancel").await;
    assert_eq!(json["reasoning"], "booking:awaiting_specialty");
    assert!(json.get("action").is_none());

    let resp = app.oneshot(get("/appointments/u1")).await.unwrap();
    let json = body_json(resp).await;
    assert!(json["appointments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_no_backend_falls_back_to_default() {
    let app = app_with_user("u1", "Ana").await;
    let (status, json) = chat(&app, "u1", "any parking spots nearby").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reasoning"], "booking:default");
    assert!(json.get("action_result").is_none());
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_chat_stream_events() {
    let app = app_with_user("u1", "Ana").await;
    let resp = app
        .oneshot(post_json(
            "/chat/stream",
            serde_json::json!({ "user_id": "u1", "message": "book an appointment" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(body.contains("event: fragment"));
    assert!(body.contains("event: done"));
    assert!(body.contains("booking:intent"));
    assert!(body.find("event: fragment").unwrap() < body.find("event: done").unwrap());
}

#[tokio::test]
async fn test_chat_stream_unknown_user() {
    let resp = make_app()
        .oneshot(post_json(
            "/chat/stream",
            serde_json::json!({ "user_id": "ghost", "message": "hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Appointments
// =============================================================================

#[tokio::test]
async fn test_appointments_unknown_user() {
    let resp = make_app().oneshot(get("/appointments/ghost")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_appointments_empty() {
    let app = app_with_user("u1", "Ana").await;
    let resp = app.oneshot(get("/appointments/u1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["appointments"], serde_json::json!([]));
}
