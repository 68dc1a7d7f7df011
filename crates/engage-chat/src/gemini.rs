//! Chat backend talking directly to the Generative Language
//! `generateContent` endpoint.
//!
//! The endpoint is stateless, so each session's system instruction and turn
//! history live here in memory, keyed by a uuid session id.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use engage_core::config::BackendConfig;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{build_client, BackendError, ChatBackend, PromptGenerator, SessionStart};

const MAX_OUTPUT_TOKENS: u32 = 8192;

const PROMPT_REQUEST: &str = "Generate 6 unique, one-sentence example questions a patient might \
ask a healthcare chatbot. The questions should cover a range of topics like scheduling, specific \
services (e.g., podiatry, pediatrics), insurance, finding locations, and asking for \
weekend/evening hours. Return the response as a valid JSON array of strings. Example format: \
[\"Question 1\", \"Question 2\"]";

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\n(.*?)\n```").expect("Invalid fence regex"));

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn turn(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug, Clone)]
struct SessionHistory {
    system_instruction: String,
    turns: Vec<Content>,
}

pub struct GeminiBackend {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    prompt_model: String,
    temperature: f64,
    sessions: Mutex<HashMap<String, SessionHistory>>,
}

impl GeminiBackend {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        let model = model.into();
        Ok(Self {
            client: build_client(Duration::from_secs(120))?,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            prompt_model: model.clone(),
            model,
            temperature: 0.7,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.timeout_secs))?,
            api_key: config.resolve_api_key(),
            base_url: config.gemini_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            prompt_model: config.prompt_model.clone(),
            temperature: config.temperature,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Number of sessions currently held in memory.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        }
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String, BackendError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            BackendError::MissingCredential(
                "Gemini API key not found; set GEMINI_API_KEY or backend.api_key".to_string(),
            )
        })?;

        let url = format!("{}/{}:generateContent", self.base_url, Self::model_path(model));
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(BackendError::Malformed(err.message));
        }

        let text: String = body
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::EmptyReply);
        }
        Ok(text)
    }

    fn chat_request(&self, history: &SessionHistory) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: history.turns.clone(),
            system_instruction: Some(Content::system(&history.system_instruction)),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: None,
            },
        }
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionHistory>>, BackendError> {
        self.sessions
            .lock()
            .map_err(|e| BackendError::Malformed(format!("session lock poisoned: {}", e)))
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn start_session(
        &self,
        context: &str,
        opening: &str,
    ) -> Result<SessionStart, BackendError> {
        let mut history = SessionHistory {
            system_instruction: context.to_string(),
            turns: vec![Content::turn("user", opening)],
        };

        let reply = self.generate(&self.model, &self.chat_request(&history)).await?;
        history.turns.push(Content::turn("model", &reply));

        let session_id = Uuid::new_v4().to_string();
        self.lock_sessions()?.insert(session_id.clone(), history);
        tracing::debug!(session_id = %session_id, "Gemini session opened");

        Ok(SessionStart {
            session_id,
            response_text: reply,
        })
    }

    async fn send_message(&self, session_id: &str, message: &str) -> Result<String, BackendError> {
        let mut history = self
            .lock_sessions()?
            .get(session_id)
            .cloned()
            .ok_or_else(|| BackendError::UnknownSession(session_id.to_string()))?;
        history.turns.push(Content::turn("user", message));

        let reply = self.generate(&self.model, &self.chat_request(&history)).await?;

        // History only records exchanges that completed.
        if let Some(stored) = self.lock_sessions()?.get_mut(session_id) {
            stored.turns.push(Content::turn("user", message));
            stored.turns.push(Content::turn("model", &reply));
        }
        Ok(reply)
    }

    async fn end_session(&self, session_id: &str) {
        let removed = self
            .sessions
            .lock()
            .map(|mut sessions| sessions.remove(session_id).is_some())
            .unwrap_or(false);
        if removed {
            tracing::debug!(session_id = %session_id, "Gemini session closed");
        }
    }
}

#[async_trait]
impl PromptGenerator for GeminiBackend {
    async fn generate_prompts(&self) -> Result<Vec<String>, BackendError> {
        let request = GenerateContentRequest {
            contents: vec![Content::turn("user", PROMPT_REQUEST)],
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: Some("application/json"),
            },
        };
        let text = self.generate(&self.prompt_model, &request).await?;
        parse_prompt_list(&text)
    }
}

/// Parse a JSON array of strings, optionally wrapped in a ```json fence.
fn parse_prompt_list(text: &str) -> Result<Vec<String>, BackendError> {
    let trimmed = text.trim();
    let json = JSON_FENCE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let prompts: Vec<String> =
        serde_json::from_str(json).map_err(|e| BackendError::Malformed(e.to_string()))?;
    if prompts.is_empty() {
        return Err(BackendError::EmptyReply);
    }
    Ok(prompts)
}
