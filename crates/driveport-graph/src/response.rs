//! Response parsing
//!
//! Turns a completed HTTP exchange into either a decoded JSON document or a
//! classified [`DriveError`]. Both the identity platform and the drive API
//! report failures as JSON payloads, sometimes with a success status, so every
//! body is checked for an `error` member before it is handed to a typed
//! decoder.
//!
//! Error payload shapes:
//!
//! - drive API: `{"error": {"code": "...", "message": "..."}}`
//! - token endpoint: `{"error": "invalid_grant", "error_description": "..."}`

use driveport_core::domain::{DriveError, DriveResult};
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// A fully-read HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    /// `Content-Type` header value, if any
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Reads the status, content type and whole body of `response`
    pub async fn collect(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.bytes().await?.to_vec();

        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    /// Returns true when the declared MIME type is JSON
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .eq_ignore_ascii_case("application/json")
            })
            .unwrap_or(false)
    }
}

/// Decodes a JSON object body, classifying every failure
///
/// - transport error → [`DriveError::General`]
/// - empty body → [`DriveError::EmptyResponse`] (or [`DriveError::ServerSide`]
///   on a non-success status)
/// - `error` member present → [`DriveError::ServerSide`]
/// - non-success status without a recognizable payload →
///   [`DriveError::ServerSide`] naming the status
/// - not JSON, or not an object → [`DriveError::MisformattedResponse`]
pub fn parse_document(
    response: Result<RawResponse, reqwest::Error>,
) -> DriveResult<Map<String, Value>> {
    let response = response.map_err(DriveError::general)?;
    let success = response.status.is_success();

    if response.body.iter().all(u8::is_ascii_whitespace) {
        if success {
            return Err(DriveError::EmptyResponse);
        }
        return Err(status_error(response.status));
    }

    let value: Value = match serde_json::from_slice(&response.body) {
        Ok(value) => value,
        Err(e) if success => {
            return Err(DriveError::misformatted(format!("invalid JSON body: {e}")))
        }
        Err(_) => return Err(status_error(response.status)),
    };

    let document = match value {
        Value::Object(map) => map,
        _ if success => return Err(DriveError::misformatted("JSON body is not an object")),
        _ => return Err(status_error(response.status)),
    };

    if let Some(message) = error_message(&document) {
        debug!(status = %response.status, %message, "Provider returned an error payload");
        return Err(DriveError::ServerSide(message));
    }

    if !success {
        return Err(status_error(response.status));
    }

    Ok(document)
}

/// Decodes a parsed document into a typed DTO
///
/// A missing required field or a type mismatch becomes
/// [`DriveError::MisformattedResponse`].
pub fn decode<T: DeserializeOwned>(document: Map<String, Value>) -> DriveResult<T> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| DriveError::misformatted(e.to_string()))
}

/// Shorthand for [`parse_document`] followed by [`decode`]
pub fn parse_typed<T: DeserializeOwned>(
    response: Result<RawResponse, reqwest::Error>,
) -> DriveResult<T> {
    decode(parse_document(response)?)
}

/// Looks for an error object embedded in a JSON download body
///
/// Returns `None` when the body is not JSON or carries no `error` member; the
/// bytes are then genuine file content.
pub fn embedded_error(response: &RawResponse) -> Option<DriveError> {
    if !response.is_json() {
        return None;
    }
    let value: Value = serde_json::from_slice(&response.body).ok()?;
    let document = value.as_object()?;
    error_message(document).map(DriveError::ServerSide)
}

/// Extracts the provider's message from an `error` member
fn error_message(document: &Map<String, Value>) -> Option<String> {
    match document.get("error")? {
        Value::Object(error) => {
            let message = ["message", "code"]
                .iter()
                .filter_map(|key| error.get(*key).and_then(Value::as_str))
                .find(|s| !s.is_empty())
                .unwrap_or("unknown error");
            Some(message.to_string())
        }
        Value::String(code) => {
            let message = document
                .get("error_description")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(code);
            Some(message.to_string())
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn status_error(status: StatusCode) -> DriveError {
    DriveError::ServerSide(format!(
        "HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .trim_end()
    .to_string())
}
