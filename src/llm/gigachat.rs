//! GigaChat provider implementation
//!
//! Authentication is a two-step OAuth flow: the long-lived authorization key
//! is exchanged for a short-lived access token, which is cached and
//! refreshed shortly before it expires.

use super::types::{LlmMessage, LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use crate::config::GigaChatConfig;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Certificate, Client};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;

/// Refresh the access token this many seconds before GigaChat says it expires
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

const PEM_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Cached OAuth access token
#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// GigaChat chat-completions service
pub struct GigaChatService {
    client: Client,
    credentials: String,
    scope: String,
    model: String,
    auth_url: String,
    chat_url: String,
    token: RwLock<Option<AccessToken>>,
}

impl GigaChatService {
    /// Build the service, loading the authorization key and trust anchor
    /// named in the configuration
    pub fn new(config: &GigaChatConfig) -> Result<Self, LlmError> {
        let credentials = load_credentials(config)?;
        let certificates = load_certificates(&config.ca_bundle_path)?;

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::invalid_request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::from_parts(client, credentials, config))
    }

    fn from_parts(client: Client, credentials: String, config: &GigaChatConfig) -> Self {
        Self {
            client,
            credentials,
            scope: config.scope.clone(),
            model: config.model.clone(),
            auth_url: config.auth_url.clone(),
            chat_url: format!("{}/chat/completions", config.api_url.trim_end_matches('/')),
            token: RwLock::new(None),
        }
    }

    /// Return a valid access token, fetching a new one if needed
    async fn access_token(&self) -> Result<String, LlmError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another request may have refreshed it while we waited
        if let Some(token) = guard.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    async fn fetch_token(&self) -> Result<AccessToken, LlmError> {
        tracing::debug!(scope = %self.scope, "Requesting GigaChat access token");

        let response = self
            .client
            .post(&self.auth_url)
            .header("Authorization", format!("Basic {}", self.credentials))
            .header("RqUID", uuid::Uuid::new_v4().to_string())
            .header("Accept", "application/json")
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &error_message(&body)));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse token response: {e}")))?;
        let expires_at = DateTime::from_timestamp_millis(token.expires_at).ok_or_else(|| {
            LlmError::unknown(format!("Invalid token expiry: {}", token.expires_at))
        })?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }

    async fn send_chat(&self, token: &str, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
        };

        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &error_message(&text)));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {text}"))
        })?;

        normalize_response(parsed)
    }
}

#[async_trait]
impl LlmService for GigaChatService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let token = self.access_token().await?;
        match self.send_chat(&token, request).await {
            // Token revoked or expired early: fetch a new one and retry once
            Err(e) if e.kind == super::LlmErrorKind::Auth => {
                tracing::warn!(error = %e.message, "GigaChat rejected access token, refreshing");
                self.invalidate_token().await;
                let token = self.access_token().await?;
                self.send_chat(&token, request).await
            }
            other => other,
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn load_credentials(config: &GigaChatConfig) -> Result<String, LlmError> {
    if let Some(credentials) = &config.credentials {
        return Ok(credentials.trim().to_string());
    }

    let Some(path) = &config.credentials_file else {
        return Err(LlmError::auth(
            "No GigaChat credentials configured. Set GIGACHAT_CREDENTIALS or GIGACHAT_CREDENTIALS_FILE.",
        ));
    };

    let credentials = std::fs::read_to_string(path).map_err(|e| {
        LlmError::auth(format!(
            "Failed to read credentials file {}: {e}",
            path.display()
        ))
    })?;
    let credentials = credentials.trim();
    if credentials.is_empty() {
        return Err(LlmError::auth(format!(
            "Credentials file {} is empty",
            path.display()
        )));
    }
    Ok(credentials.to_string())
}

/// Load the trust anchor(s), accepting either a PEM bundle or a single DER
/// certificate
fn load_certificates(path: &Path) -> Result<Vec<Certificate>, LlmError> {
    let bytes = std::fs::read(path).map_err(|e| {
        LlmError::invalid_request(format!(
            "Failed to read CA certificate {}: {e}",
            path.display()
        ))
    })?;

    let is_pem = bytes
        .windows(PEM_MARKER.len())
        .any(|window| window == PEM_MARKER);

    let certificates = if is_pem {
        Certificate::from_pem_bundle(&bytes)
    } else {
        Certificate::from_der(&bytes).map(|c| vec![c])
    }
    .map_err(|e| {
        LlmError::invalid_request(format!(
            "Invalid CA certificate {}: {e}",
            path.display()
        ))
    })?;

    if certificates.is_empty() {
        return Err(LlmError::invalid_request(format!(
            "No certificates found in {}",
            path.display()
        )));
    }
    Ok(certificates)
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

fn normalize_response(resp: ChatResponse) -> Result<LlmResponse, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::unknown("No choices in response"))?;

    Ok(LlmResponse {
        text: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
        usage: Usage {
            prompt_tokens: resp.usage.prompt_tokens,
            completion_tokens: resp.usage.completion_tokens,
            total_tokens: resp.usage.total_tokens,
        },
    })
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}
