//! HTTP clients for the chat backend.
//!
//! The send and capture pipelines talk to the backend through the
//! [`ChatBackend`] and [`Transcriber`] traits so tests can script
//! responses without a network. [`HttpApi`] is the production
//! implementation for both.

use crate::audio::AudioClip;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Errors from the remote endpoints, classified for the
/// failure-message policy in the send pipeline.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error("No response from server: {0}")]
    NetworkUnreachable(String),

    #[error("Server error ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            ApiError::NetworkUnreachable(e.to_string())
        } else {
            ApiError::MalformedResponse(e.to_string())
        }
    }
}

/// Sends one user message and returns the bot reply.
#[async_trait]
pub(crate) trait ChatBackend: Send + Sync {
    async fn send_message(&self, message: &str, token: &str) -> Result<String, ApiError>;
}

/// Submits one captured audio clip for transcription.
#[async_trait]
pub(crate) trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, ApiError>;
}

/// Request body for the chat endpoint.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Success body from the chat endpoint.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Success body from the transcription endpoint.
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Error body the backend uses for rejections.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Client for the chat backend's HTTP endpoints.
#[derive(Clone)]
pub(crate) struct HttpApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub(crate) fn new(base_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-success response into `ServerRejected`, preferring the
/// backend's own error text when the body carries one.
pub(crate) async fn rejection(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.trim().to_string());
    ApiError::ServerRejected { status, message }
}

#[async_trait]
impl ChatBackend for HttpApi {
    #[instrument(skip(self, message, token), fields(message_len = message.len()))]
    async fn send_message(&self, message: &str, token: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.endpoint("/chat"))
            .header("Authorization", format!("Bearer {token}"))
            .json(&ChatRequest { message })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(format!("Failed to parse reply: {e}")))?;

        body.response
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("No reply text in response".into()))
    }
}

#[async_trait]
impl Transcriber for HttpApi {
    #[instrument(skip(self, clip), fields(samples = clip.samples.len()))]
    async fn transcribe(&self, clip: AudioClip) -> Result<String, ApiError> {
        let wav = clip.to_wav();
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("/transcribe"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: TranscribeResponse = response.json().await.map_err(|e| {
            ApiError::MalformedResponse(format!("Failed to parse transcription: {e}"))
        })?;

        body.text
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("No text in transcription response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serialization() {
        let json = serde_json::to_string(&ChatRequest { message: "hello" })
            .expect("Failed to serialize");
        assert_eq!(json, r#"{"message":"hello"}"#);
    }

    #[test]
    fn test_chat_response_deserialization() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"response":"hi there"}"#).expect("Failed to deserialize");
        assert_eq!(body.response.as_deref(), Some("hi there"));
    }

    #[test]
    fn test_chat_response_missing_field() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"unrelated":1}"#).expect("Failed to deserialize");
        assert!(body.response.is_none());
    }

    #[test]
    fn test_error_body_extraction() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Token has expired!"}"#).expect("deserialize");
        assert_eq!(body.error.as_deref(), Some("Token has expired!"));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let api = HttpApi::new("http://127.0.0.1:5000/").expect("client");
        assert_eq!(api.endpoint("/chat"), "http://127.0.0.1:5000/chat");
    }
}
