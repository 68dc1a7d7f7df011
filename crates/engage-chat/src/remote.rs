//! Chat backend that proxies to a host chat service over JSON.
//!
//! `POST {base}/chat/start` takes `{patientContext, initialPrompt}` and
//! answers `{sessionId, responseText}`; `POST {base}/chat/send` takes
//! `{sessionId, message}` and answers `{responseText}`.

use std::time::Duration;

use async_trait::async_trait;
use engage_core::config::BackendConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::{build_client, BackendError, ChatBackend, SessionStart};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest<'a> {
    patient_context: &'a str,
    initial_prompt: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    session_id: String,
    response_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    session_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    response_text: String,
}

pub struct RemoteChatBackend {
    client: Client,
    base_url: String,
}

impl RemoteChatBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    async fn post<B, R>(&self, route: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}/{}", self.base_url, route);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for RemoteChatBackend {
    async fn start_session(
        &self,
        context: &str,
        opening: &str,
    ) -> Result<SessionStart, BackendError> {
        let body = StartRequest {
            patient_context: context,
            initial_prompt: opening,
        };
        let resp: StartResponse = self.post("chat/start", &body).await?;
        tracing::debug!(session_id = %resp.session_id, "Remote chat session opened");
        Ok(SessionStart {
            session_id: resp.session_id,
            response_text: resp.response_text,
        })
    }

    async fn send_message(&self, session_id: &str, message: &str) -> Result<String, BackendError> {
        let body = SendRequest {
            session_id,
            message,
        };
        let resp: SendResponse = self.post("chat/send", &body).await?;
        Ok(resp.response_text)
    }
}
