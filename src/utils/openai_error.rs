//! Error bodies returned by the OpenAI REST API.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// OpenAI API error response wrapper.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIError,
}

/// OpenAI API error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIError {
    /// Human-readable error message.
    pub message: String,

    /// Error type identifier.
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    /// Error code (if applicable).
    #[serde(default)]
    pub code: Option<String>,
}

/// One-line description of a failed API call.
///
/// Uses the structured error message when the body is an OpenAI error,
/// otherwise the status and (truncated) raw body.
pub fn describe_failure(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<OpenAIErrorResponse>(body) {
        return match parsed.error.error_type {
            Some(kind) => format!(
                "OpenAI API error ({}): {} ({})",
                status.as_u16(),
                parsed.error.message,
                kind
            ),
            None => format!(
                "OpenAI API error ({}): {}",
                status.as_u16(),
                parsed.error.message
            ),
        };
    }
    let body = body.trim();
    if body.is_empty() {
        format!("OpenAI API error ({status})")
    } else {
        let snippet: String = body.chars().take(200).collect();
        format!("OpenAI API error ({status}): {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_structured_error() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            describe_failure(StatusCode::UNAUTHORIZED, body),
            "OpenAI API error (401): Incorrect API key provided (invalid_request_error)"
        );
    }

    #[test]
    fn test_describe_raw_error() {
        let message = describe_failure(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(message.contains("502"));
        assert!(message.ends_with("upstream down"));
    }

    #[test]
    fn test_describe_empty_body() {
        assert_eq!(
            describe_failure(StatusCode::SERVICE_UNAVAILABLE, ""),
            "OpenAI API error (503 Service Unavailable)"
        );
    }
}
