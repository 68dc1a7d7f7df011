//! Collaborator interfaces for the generative chat model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Errors surfaced by a chat backend or prompt generator.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("backend returned an empty reply")]
    EmptyReply,
    #[error("failed to build HTTP client: {0}")]
    ClientSetup(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BackendError::Unreachable(err.to_string())
        }
    }
}

/// HTTP client shared by the network backends.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| BackendError::ClientSetup(e.to_string()))
}

/// A freshly opened model session and its first reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: String,
    pub response_text: String,
}

/// The chat model behind a conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a session primed with `context` and answer `opening`.
    async fn start_session(
        &self,
        context: &str,
        opening: &str,
    ) -> Result<SessionStart, BackendError>;

    /// Send one user turn and return the raw reply text.
    async fn send_message(&self, session_id: &str, message: &str) -> Result<String, BackendError>;

    /// Release whatever the backend holds for `session_id`. Unknown ids are ignored.
    async fn end_session(&self, _session_id: &str) {}
}

/// Source of example prompts for the landing view.
#[async_trait]
pub trait PromptGenerator: Send + Sync {
    async fn generate_prompts(&self) -> Result<Vec<String>, BackendError>;
}
