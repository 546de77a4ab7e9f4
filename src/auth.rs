//! Authentication against the chat backend.
//!
//! Signup and login are plain request/response calls; the bearer token
//! they yield is held in memory for the lifetime of the session and
//! cleared from memory on drop. Nothing here is persisted.

use crate::api::{rejection, ApiError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use zeroize::Zeroize;

/// Session-scoped bearer token.
pub(crate) struct SessionToken {
    token: String,
}

impl SessionToken {
    pub(crate) fn new(token: String) -> Self {
        Self { token }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.token
    }
}

impl Drop for SessionToken {
    fn drop(&mut self) {
        // Clear the credential from memory
        self.token.zeroize();
    }
}

#[derive(Debug, Serialize)]
struct CredentialsRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Client for the backend's signup and login endpoints.
pub(crate) struct AuthClient {
    base_url: String,
    client: reqwest::Client,
}

impl AuthClient {
    pub(crate) fn new(base_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client for AuthClient")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Register a new account.
    #[instrument(skip(self, password))]
    pub(crate) async fn signup(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}/signup", self.base_url))
            .json(&CredentialsRequest { username, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        info!("Account registered");
        Ok(())
    }

    /// Log in and return the issued bearer token.
    #[instrument(skip(self, password))]
    pub(crate) async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, ApiError> {
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&CredentialsRequest { username, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(format!("Failed to parse login reply: {e}")))?;

        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("No token in login response".into()))?;

        info!("Logged in");
        Ok(SessionToken::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_serialization() {
        let json = serde_json::to_string(&CredentialsRequest {
            username: "alice",
            password: "secret",
        })
        .expect("Failed to serialize");
        assert_eq!(json, r#"{"username":"alice","password":"secret"}"#);
    }

    #[test]
    fn test_login_response_deserialization() {
        let body: LoginResponse =
            serde_json::from_str(r#"{"token":"abc.def.ghi"}"#).expect("Failed to deserialize");
        assert_eq!(body.token.as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_session_token_exposes_value() {
        let token = SessionToken::new("abc".to_string());
        assert_eq!(token.as_str(), "abc");
    }
}
