//! Route handlers. Each UI action is one request; responses carry the
//! re-rendered view.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use engage_chat::{AnalyticsReport, SendOutcome, ViewName, ViewSnapshot};
use engage_core::types::{AppointmentDetails, ChatRecord, NewPatientForm, Patient, PatientId};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request/response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub archived_sessions: usize,
    pub view: ViewName,
}

/// Body for POST /conversation/start. Exactly one field must be set.
#[derive(Debug, Default, Deserialize)]
pub struct StartConversationRequest {
    pub patient_id: Option<PatientId>,
    pub new_patient: Option<NewPatientForm>,
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub view: ViewName,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub outcome: SendOutcome,
    pub view: ViewSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndConversationResponse {
    pub record: ChatRecord,
    pub view: ViewSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptsResponse {
    pub prompts: Vec<String>,
}

// =============================================================================
// Status and reference data
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        archived_sessions: state.controller.archived_sessions()?,
        view: state.controller.view_name()?,
    }))
}

/// GET /patients
pub async fn patients(State(state): State<AppState>) -> Json<Vec<Patient>> {
    Json(state.controller.patients().to_vec())
}

/// GET /view
pub async fn view(State(state): State<AppState>) -> Result<Json<ViewSnapshot>, ApiError> {
    Ok(Json(state.controller.view()?))
}

// =============================================================================
// Conversation
// =============================================================================

/// POST /conversation/start
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let outcome = match (req.patient_id, req.new_patient) {
        (Some(id), None) => state.controller.start_with_patient(id).await?,
        (None, Some(form)) => state.controller.start_with_new_patient(form).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "provide exactly one of 'patient_id' or 'new_patient'".to_string(),
            ));
        }
    };

    Ok(Json(ConversationResponse {
        outcome,
        view: state.controller.view()?,
    }))
}

/// POST /conversation/simulate
pub async fn simulate(
    State(state): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<ViewSnapshot>, ApiError> {
    state.controller.start_simulated_chat(&req.prompt).await?;
    Ok(Json(state.controller.view()?))
}

/// POST /conversation/messages
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let outcome = state.controller.send_user_message(&req.text).await?;
    Ok(Json(ConversationResponse {
        outcome,
        view: state.controller.view()?,
    }))
}

/// POST /conversation/conversion
pub async fn record_conversion(
    State(state): State<AppState>,
) -> Result<Json<ViewSnapshot>, ApiError> {
    state.controller.record_conversion()?;
    Ok(Json(state.controller.view()?))
}

/// POST /conversation/appointment
pub async fn record_appointment(
    State(state): State<AppState>,
    Json(details): Json<AppointmentDetails>,
) -> Result<Json<ViewSnapshot>, ApiError> {
    state.controller.record_appointment(details)?;
    Ok(Json(state.controller.view()?))
}

/// POST /conversation/end
pub async fn end_conversation(
    State(state): State<AppState>,
) -> Result<Json<EndConversationResponse>, ApiError> {
    let record = state.controller.end_conversation().await?;
    Ok(Json(EndConversationResponse {
        record,
        view: state.controller.view()?,
    }))
}

// =============================================================================
// Landing and analytics
// =============================================================================

/// GET /prompts
pub async fn prompts(State(state): State<AppState>) -> Result<Json<PromptsResponse>, ApiError> {
    Ok(Json(PromptsResponse {
        prompts: state.controller.prompts()?,
    }))
}

/// POST /prompts/generate
pub async fn generate_prompts(
    State(state): State<AppState>,
) -> Result<Json<PromptsResponse>, ApiError> {
    let prompts = state.controller.generate_example_prompts().await?;
    Ok(Json(PromptsResponse { prompts }))
}

/// GET /analytics - the report, without changing the view.
pub async fn analytics(State(state): State<AppState>) -> Result<Json<AnalyticsReport>, ApiError> {
    Ok(Json(state.controller.report()?))
}

/// POST /navigate
pub async fn navigate(
    State(state): State<AppState>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<ViewSnapshot>, ApiError> {
    Ok(Json(state.controller.navigate(req.view)?))
}

// =============================================================================
// Events
// =============================================================================

/// GET /events - SSE stream of view snapshots.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(snapshot) => Event::default().event("view").json_data(&snapshot).ok().map(Ok),
        // Lagged receivers skip ahead to the next snapshot.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
