//! Integration tests for the Engage API.
//!
//! Each test builds its own router over a scripted in-memory chat backend and
//! drives it with `oneshot` requests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use engage_api::create_router;
use engage_api::handlers::{HealthResponse, PromptsResponse};
use engage_api::state::AppState;
use engage_chat::{BackendError, ChatBackend, PromptGenerator, SessionStart};
use engage_core::config::EngageConfig;

// =============================================================================
// Helpers
// =============================================================================

/// Greets with a tagged welcome and answers every message with a tagged echo.
struct ScriptedBackend;

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn start_session(
        &self,
        _context: &str,
        _opening: &str,
    ) -> Result<SessionStart, BackendError> {
        Ok(SessionStart {
            session_id: "backend-1".to_string(),
            response_text: "Hello James! [NEEDS_IDENTIFIED: SCHEDULING] Welcome back.".to_string(),
        })
    }

    async fn send_message(&self, _session_id: &str, message: &str) -> Result<String, BackendError> {
        Ok(format!("You said: {} [NOTE: Appointment request made]", message))
    }
}

struct DownBackend;

#[async_trait]
impl ChatBackend for DownBackend {
    async fn start_session(
        &self,
        _context: &str,
        _opening: &str,
    ) -> Result<SessionStart, BackendError> {
        Err(BackendError::Unreachable("connection refused".to_string()))
    }

    async fn send_message(&self, _session_id: &str, _message: &str) -> Result<String, BackendError> {
        Err(BackendError::Unreachable("connection refused".to_string()))
    }
}

struct NoPrompts;

#[async_trait]
impl PromptGenerator for NoPrompts {
    async fn generate_prompts(&self) -> Result<Vec<String>, BackendError> {
        Err(BackendError::MissingCredential("no key".to_string()))
    }
}

fn make_state_with(config: EngageConfig, backend: Arc<dyn ChatBackend>) -> AppState {
    AppState::new(config, backend, Arc::new(NoPrompts))
}

fn make_state() -> AppState {
    make_state_with(EngageConfig::default(), Arc::new(ScriptedBackend))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Send one request through a router built on `state`.
async fn call(state: &AppState, req: Request<Body>) -> axum::response::Response {
    create_router(state.clone()).oneshot(req).await.unwrap()
}

// =============================================================================
// Status and reference data
// =============================================================================

#[tokio::test]
async fn test_health() {
    let state = make_state();
    let resp = call(&state, get("/health")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.archived_sessions, 0);
}

#[tokio::test]
async fn test_patients_lists_directory() {
    let state = make_state();
    let json = body_json(call(&state, get("/patients")).await).await;
    let patients = json.as_array().unwrap();
    assert_eq!(patients.len(), 4);
    assert_eq!(patients[1]["name"], "James Washington");
    assert_eq!(patients[1]["risk_level"], "Medium");
}

#[tokio::test]
async fn test_initial_view_is_landing_with_default_prompts() {
    let state = make_state();
    let json = body_json(call(&state, get("/view")).await).await;
    assert_eq!(json["view"], "landing");
    assert_eq!(json["prompts"].as_array().unwrap().len(), 6);
}

// =============================================================================
// Conversation lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_conversation_lifecycle() {
    let state = make_state();

    let resp = call(&state, post_json("/conversation/start", r#"{"patient_id": 2}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["outcome"]["status"], "replied");
    assert_eq!(json["view"]["view"], "chat");
    assert_eq!(json["view"]["messages"][0]["content"], "Hello James! Welcome back.");
    assert_eq!(json["view"]["session"]["needs_identified"][0], "SCHEDULING");

    let resp = call(&state, post_json("/conversation/messages", r#"{"text": "book a visit"}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    let messages = json["view"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["delivery"], "delivered");
    assert_eq!(messages[2]["content"], "You said: book a visit");
    assert_eq!(json["view"]["session"]["notes"][0], "Appointment request made");

    let resp = call(&state, post_empty("/conversation/conversion")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = call(&state, post_empty("/conversation/end")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["record"]["patient_name"], "James Washington");
    assert_eq!(json["record"]["appointment_scheduled"], "Yes");
    assert_eq!(json["record"]["needs_identified"], "SCHEDULING");
    assert_eq!(json["record"]["notes"], "Appointment request made");
    assert_eq!(json["view"]["view"], "landing");

    let json = body_json(call(&state, get("/analytics")).await).await;
    assert_eq!(json["total_sessions"], 1);
    assert_eq!(json["conversions"], 1);
    assert_eq!(json["conversion_rate_percent"], 100);
}

#[tokio::test]
async fn test_start_with_new_patient() {
    let state = make_state();
    let body = r#"{"new_patient": {"name": "Ana Lopez", "age": "29"}}"#;
    let resp = call(&state, post_json("/conversation/start", body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["view"]["patient"]["name"], "Ana Lopez");
    assert_eq!(json["view"]["patient"]["phone"], "N/A");
}

#[tokio::test]
async fn test_start_requires_exactly_one_patient_source() {
    let state = make_state();
    let resp = call(&state, post_json("/conversation/start", "{}")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "bad_request");

    let both = r#"{"patient_id": 1, "new_patient": {"name": "A", "age": "3"}}"#;
    let resp = call(&state, post_json("/conversation/start", both)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_new_patient_missing_age_is_bad_request() {
    let state = make_state();
    let body = r#"{"new_patient": {"name": "Ana Lopez", "age": ""}}"#;
    let resp = call(&state, post_json("/conversation/start", body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_patient_is_not_found() {
    let state = make_state();
    let resp = call(&state, post_json("/conversation/start", r#"{"patient_id": 404}"#)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_start_while_chatting_is_conflict() {
    let state = make_state();
    call(&state, post_json("/conversation/start", r#"{"patient_id": 1}"#)).await;
    let resp = call(&state, post_json("/conversation/start", r#"{"patient_id": 2}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let json = body_json(resp).await;
    assert_eq!(json["details"]["view"], "chat");
    assert_eq!(json["details"]["action"], "start a conversation");
}

#[tokio::test]
async fn test_message_outside_chat_is_conflict() {
    let state = make_state();
    let resp = call(&state, post_json("/conversation/messages", r#"{"text": "hi"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = call(&state, post_empty("/conversation/end")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_appointment_is_archived() {
    let state = make_state();
    let details = r#"{"time": "2024-03-04 09:00", "provider": "Dr. Robert Post", "location": "DePaul Carrollton"}"#;

    let resp = call(&state, post_json("/conversation/appointment", details)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    call(&state, post_json("/conversation/start", r#"{"patient_id": 2}"#)).await;
    let resp = call(&state, post_json("/conversation/appointment", r#"{"time": "", "provider": "x", "location": "y"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = call(&state, post_json("/conversation/appointment", details)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["session"]["appointment_details"]["provider"], "Dr. Robert Post");

    let json = body_json(call(&state, post_empty("/conversation/end")).await).await;
    assert_eq!(json["record"]["appointment_location"], "DePaul Carrollton");
}

#[tokio::test]
async fn test_blank_message_is_skipped() {
    let state = make_state();
    call(&state, post_json("/conversation/start", r#"{"patient_id": 2}"#)).await;
    let resp = call(&state, post_json("/conversation/messages", r#"{"text": "  "}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["outcome"]["status"], "skipped");
    assert_eq!(json["outcome"]["reason"], "blank_message");
}

#[tokio::test]
async fn test_oversized_message_is_bad_request() {
    let mut config = EngageConfig::default();
    config.chat.max_message_length = 5;
    let state = make_state_with(config, Arc::new(ScriptedBackend));
    call(&state, post_json("/conversation/start", r#"{"patient_id": 2}"#)).await;
    let resp = call(&state, post_json("/conversation/messages", r#"{"text": "too long"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backend_down_shows_apology() {
    let state = make_state_with(EngageConfig::default(), Arc::new(DownBackend));
    let resp = call(&state, post_json("/conversation/start", r#"{"patient_id": 2}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["outcome"]["status"], "failed");
    assert_eq!(json["view"]["connected"], false);
    assert_eq!(
        json["view"]["messages"][0]["content"],
        "I'm sorry, I'm having trouble connecting right now. Please try again later."
    );

    let resp = call(&state, post_json("/conversation/messages", r#"{"text": "hello"}"#)).await;
    let json = body_json(resp).await;
    assert_eq!(json["outcome"]["reason"], "no_backend_session");
}

// =============================================================================
// Simulated chat
// =============================================================================

#[tokio::test]
async fn test_simulated_chat() {
    let state = make_state();
    let body = r#"{"prompt": "Do you offer podiatry services?"}"#;
    let resp = call(&state, post_json("/conversation/simulate", body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["view"], "chat");
    assert_eq!(json["patient"]["name"], "James Washington");
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["content"], "Do you offer podiatry services?");
    assert_eq!(messages[2]["content"], "You said: Do you offer podiatry services?");
}

#[tokio::test]
async fn test_simulated_chat_backend_failure_is_bad_gateway() {
    let state = make_state_with(EngageConfig::default(), Arc::new(DownBackend));
    let resp = call(&state, post_json("/conversation/simulate", r#"{"prompt": "hi"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(call(&state, get("/view")).await).await;
    assert_eq!(json["view"], "landing");
}

#[tokio::test]
async fn test_simulated_chat_empty_prompt() {
    let state = make_state();
    let resp = call(&state, post_json("/conversation/simulate", r#"{"prompt": ""}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Prompts, analytics and navigation
// =============================================================================

#[tokio::test]
async fn test_generate_prompts_falls_back() {
    let state = make_state();
    let resp = call(&state, post_empty("/prompts/generate")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let prompts: PromptsResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(prompts.prompts.len(), 6);
    assert_eq!(prompts.prompts[0], "I need to schedule an appointment online.");

    let json = body_json(call(&state, get("/prompts")).await).await;
    assert_eq!(json["prompts"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_navigate_to_analytics_and_back() {
    let state = make_state();
    let resp = call(&state, post_json("/navigate", r#"{"view": "analytics"}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["view"], "analytics");
    assert_eq!(json["report"]["total_sessions"], 0);

    let resp = call(&state, post_json("/conversation/start", r#"{"patient_id": 1}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = call(&state, post_json("/navigate", r#"{"view": "landing"}"#)).await;
    let json = body_json(resp).await;
    assert_eq!(json["view"], "landing");
}

#[tokio::test]
async fn test_navigate_to_chat_is_bad_request() {
    let state = make_state();
    let resp = call(&state, post_json("/navigate", r#"{"view": "chat"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_navigate_away_from_chat_is_conflict() {
    let state = make_state();
    call(&state, post_json("/conversation/start", r#"{"patient_id": 1}"#)).await;
    let resp = call(&state, post_json("/navigate", r#"{"view": "analytics"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_analytics_lists_newest_first() {
    let state = make_state();
    for id in [1, 3] {
        let body = format!(r#"{{"patient_id": {}}}"#, id);
        call(&state, post_json("/conversation/start", &body)).await;
        call(&state, post_empty("/conversation/end")).await;
    }

    let json = body_json(call(&state, get("/analytics")).await).await;
    assert_eq!(json["total_sessions"], 2);
    assert_eq!(json["conversions"], 0);
    assert_eq!(json["records"][0]["patient_name"], "Emma Thompson");
    assert_eq!(json["records"][1]["patient_name"], "Maria Rodriguez");
    assert_eq!(json["records"][0]["outcome_summary"], "Session ended");
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let mut config = EngageConfig::default();
    config.chat.requests_per_second = 2;
    let state = make_state_with(config, Arc::new(ScriptedBackend));
    let app = create_router(state);

    let mut limited = 0;
    for _ in 0..6 {
        let resp = app.clone().oneshot(get("/view")).await.unwrap();
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert!(limited > 0);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let mut config = EngageConfig::default();
    config.chat.requests_per_second = 1;
    let state = make_state_with(config, Arc::new(ScriptedBackend));
    let app = create_router(state);

    for _ in 0..5 {
        let resp = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_events_publish_view_changes() {
    let state = make_state();
    let mut rx = state.event_tx.subscribe();
    call(&state, post_json("/navigate", r#"{"view": "analytics"}"#)).await;

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.name(), engage_chat::ViewName::Analytics);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let state = make_state();
    let resp = call(&state, get("/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
