//! HTTP utilities for Google REST API calls

use crate::error::BackendError;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const USER_AGENT: &str = concat!("firecrud/", env!("CARGO_PKG_VERSION"));

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for Google API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackendError::unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, BackendError> {
        self.send(Method::GET, url, token, None).await
    }

    /// Make a POST request with a JSON body
    pub async fn post(&self, url: &str, token: &str, body: &Value) -> Result<Value, BackendError> {
        self.send(Method::POST, url, token, Some(body)).await
    }

    /// Make a PATCH request with a JSON body
    pub async fn patch(&self, url: &str, token: &str, body: &Value) -> Result<Value, BackendError> {
        self.send(Method::PATCH, url, token, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value, BackendError> {
        self.send(Method::DELETE, url, token, None).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value, BackendError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::unavailable(format!("failed to send request: {e}")))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| BackendError::unavailable(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            // Only the sanitized/truncated body goes to the log
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(rejection(status, &response_body));
        }

        // Handle empty response
        if response_body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_body)
            .map_err(|e| BackendError::malformed(format!("failed to parse response JSON: {e}")))
    }
}

/// Build a rejection from a Google error envelope
///
/// Google APIs answer `{"error": {"code", "message", "status"}}`. Firestore
/// fills `status` (`NOT_FOUND`, `ALREADY_EXISTS`, ...); Identity Toolkit puts
/// its reason in `message` instead (`EMAIL_EXISTS`, `USER_NOT_FOUND`,
/// `WEAK_PASSWORD : Password should be ...`).
pub fn rejection(status: StatusCode, body: &str) -> BackendError {
    let envelope: Option<Value> = serde_json::from_str(body).ok();
    let error = envelope.as_ref().and_then(|v| v.get("error"));

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    let code = error
        .and_then(|e| e.get("status"))
        .and_then(|s| s.as_str())
        .filter(|s| !s.is_empty() && *s != "INVALID_ARGUMENT" && *s != "FAILED_PRECONDITION")
        .map(str::to_string)
        .or_else(|| identity_reason(&message))
        .unwrap_or_else(|| status.as_str().to_string());

    BackendError::Rejected {
        status: status.as_u16(),
        code,
        message,
    }
}

/// Identity Toolkit reasons are SCREAMING_SNAKE words at the start of the message
fn identity_reason(message: &str) -> Option<String> {
    let word = message.split([' ', ':']).next()?;
    let is_reason = word.len() > 2
        && word
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    is_reason.then(|| word.to_string())
}

/// User-facing hint for a failed backend call
pub fn hint_for(error: &BackendError) -> Option<&'static str> {
    match error {
        BackendError::Unavailable { .. } => Some("Check your network connection and try again."),
        BackendError::Malformed { .. } => None,
        BackendError::Rejected { status, .. } => match status {
            401 => Some(
                "Authentication failed. Check the service account key or run \
                 'gcloud auth application-default login'.",
            ),
            403 => Some("Permission denied. Check the IAM roles of the service account."),
            404 => Some("Resource not found."),
            409 => Some("Resource conflict. The resource may already exist."),
            429 => Some("Rate limit exceeded. Please try again later."),
            500 | 502 | 503 => Some("Service temporarily unavailable. Please try again."),
            _ => None,
        },
    }
}
