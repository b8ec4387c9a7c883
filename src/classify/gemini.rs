use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::{Host, Url};

use super::prompt::{extract_json_object, response_schema, user_text, SYSTEM_PROMPT};
use crate::library::{Classification, Model, SummaryDetail};
use crate::util::clean_field;

/// Exact host match: `localhost.example.com` is not loopback.
fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB
const DEFAULT_MAX_RETRIES: u32 = 2;
/// Keys this short are placeholders, not credentials.
const MIN_KEY_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classification unavailable: no API key configured")]
    Unavailable,
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Model returned no text")]
    EmptyResponse,
    #[error("Malformed classification: {0}")]
    Malformed(String),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

impl ClassifyError {
    /// Returns true if this error is transient and the request should be retried.
    fn is_retryable(&self) -> bool {
        match self {
            ClassifyError::Timeout(_) | ClassifyError::Network(_) => true,
            ClassifyError::HttpStatus(status) | ClassifyError::Api { status, .. } => *status >= 500,
            ClassifyError::Unavailable
            | ClassifyError::EmptyResponse
            | ClassifyError::Malformed(_)
            | ClassifyError::ResponseTooLarge(_)
            | ClassifyError::InsecureBaseUrl => false,
        }
    }

    /// True when the failure says the service could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClassifyError::Timeout(_) | ClassifyError::Network(_))
    }
}

/// One classification call.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyRequest<'a> {
    pub text: &'a str,
    pub model: Model,
    pub detail: SummaryDetail,
}

// ============================================================================
// Classifier
// ============================================================================

/// HTTP client for the Gemini `generateContent` endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Classifier {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl Classifier {
    pub fn new(client: reqwest::Client, api_key: Option<SecretString>) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn usable_key(&self) -> Option<&SecretString> {
        self.api_key
            .as_ref()
            .filter(|k| k.expose_secret().len() >= MIN_KEY_LEN)
    }

    /// Whether a plausible credential is configured. Makes no network call.
    pub fn is_available(&self) -> bool {
        self.usable_key().is_some()
    }

    // SEC: the key travels in a header, so never send it over plain HTTP
    // except to a loopback test server.
    fn check_base_url(&self) -> Result<(), ClassifyError> {
        let base = self.base_url.as_str();
        let Ok(url) = Url::parse(base) else {
            tracing::error!(base_url = %base, "Rejecting unparseable classifier base URL");
            return Err(ClassifyError::InsecureBaseUrl);
        };
        match url.scheme() {
            "https" => Ok(()),
            "http" if is_loopback_host(&url) => {
                tracing::warn!(base_url = %base, "Using non-HTTPS classifier base URL (localhost only)");
                Ok(())
            }
            _ => {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS base URL (HTTPS required except for localhost)");
                Err(ClassifyError::InsecureBaseUrl)
            }
        }
    }

    /// Classify raw input into structured metadata.
    ///
    /// Transient failures (timeouts, network errors, 5xx) are retried with
    /// exponential backoff: 1s, 2s. Text fields in the result are stripped of
    /// control characters and trimmed.
    pub async fn classify(
        &self,
        request: &ClassifyRequest<'_>,
    ) -> Result<Classification, ClassifyError> {
        let key = self.usable_key().ok_or(ClassifyError::Unavailable)?;
        self.check_base_url()?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            request.model.id()
        );
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": user_text(request.text, request.detail) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema()
            }
        });

        let started = Instant::now();
        let text = self.post_with_retry(&url, key, &body).await?;
        let classification = parse_response(&text)?;
        tracing::debug!(
            model = %request.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            title = %classification.title,
            "Classified input"
        );
        Ok(classification)
    }

    async fn post_with_retry(
        &self,
        url: &str,
        key: &SecretString,
        body: &Value,
    ) -> Result<String, ClassifyError> {
        let mut retry_count = 0;
        loop {
            match self.post_once(url, key, body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && retry_count < self.max_retries => {
                    let delay = 1u64 << retry_count; // 1s, 2s
                    tracing::debug!(
                        error = %e,
                        retry = retry_count + 1,
                        delay_secs = delay,
                        "Retrying classification after transient error"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(
        &self,
        url: &str,
        key: &SecretString,
        body: &Value,
    ) -> Result<String, ClassifyError> {
        let exchange = async {
            let response = self
                .client
                .post(url)
                .header("x-goog-api-key", key.expose_secret())
                .json(body)
                .send()
                .await?;
            let status = response.status();
            let text = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
            if !status.is_success() {
                return Err(status_error(status.as_u16(), &text));
            }
            Ok::<_, ClassifyError>(text)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout.as_secs()))?
    }

    /// Cheap authenticated reachability check: lists models.
    pub async fn probe(&self) -> Result<(), ClassifyError> {
        let key = self.usable_key().ok_or(ClassifyError::Unavailable)?;
        self.check_base_url()?;

        let url = format!("{}/v1beta/models", self.base_url);
        let request = self
            .client
            .get(&url)
            .header("x-goog-api-key", key.expose_secret())
            .send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout.as_secs()))??;

        if !response.status().is_success() {
            return Err(ClassifyError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Prefer the API's own error message over a bare status code.
fn status_error(status: u16, body: &str) -> ClassifyError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string));
    match message {
        Some(message) => ClassifyError::Api { status, message },
        None => ClassifyError::HttpStatus(status),
    }
}

/// Pull the classification out of a `generateContent` response envelope.
fn parse_response(body: &str) -> Result<Classification, ClassifyError> {
    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Malformed(format!("invalid response envelope: {e}")))?;

    if let Some(message) = envelope["error"]["message"].as_str() {
        return Err(ClassifyError::Api {
            status: 200,
            message: message.to_string(),
        });
    }

    let text: String = envelope["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        if let Some(reason) = envelope["promptFeedback"]["blockReason"].as_str() {
            return Err(ClassifyError::Api {
                status: 200,
                message: format!("prompt blocked: {reason}"),
            });
        }
        return Err(ClassifyError::EmptyResponse);
    }

    let raw: Classification = serde_json::from_str(extract_json_object(&text))
        .map_err(|e| ClassifyError::Malformed(e.to_string()))?;
    Ok(sanitize(raw))
}

fn sanitize(raw: Classification) -> Classification {
    Classification {
        title: clean_field(&raw.title),
        platform: raw.platform,
        category: clean_field(&raw.category),
        subcategory: clean_field(&raw.subcategory),
        ai_insight: clean_field(&raw.ai_insight),
        key_points: raw
            .key_points
            .iter()
            .map(|p| clean_field(p))
            .filter(|p| !p.is_empty())
            .collect(),
    }
}

/// Read a response body, failing as soon as it exceeds `limit` bytes.
async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ClassifyError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ClassifyError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ClassifyError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes)
        .map_err(|_| ClassifyError::Malformed("response is not valid UTF-8".to_string()))
}
