use thiserror::Error;
use tracing::debug;

/// Maximum length for error response bodies kept in errors
const MAX_ERROR_BODY_LENGTH: usize = 500;

const NETWORK_MESSAGE: &str = "Network error. Check your connection.";
const UNKNOWN_MESSAGE: &str = "Unknown error.";

#[derive(Error, Debug)]
pub enum HttpError {
    /// No response was received
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 4xx response
    #[error("{message} (status {status})")]
    Client {
        status: u16,
        message: String,
        body: String,
    },

    /// 5xx response, or any other non-success status
    #[error("{message} (status {status})")]
    Server {
        status: u16,
        message: String,
        body: String,
    },

    /// A token refresh was attempted and failed; the session was cleared
    #[error("Session expired. Please log in again.")]
    AuthExpired {
        #[source]
        source: Option<Box<HttpError>>,
    },

    /// Success response whose body did not have the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl HttpError {
    /// Build the enhanced error for a failed response
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let code = status.as_u16();
        let raw = server_message(body);
        let message = friendly_message(code, raw.as_deref());
        let body = truncate_body(body);
        if status.is_client_error() {
            HttpError::Client {
                status: code,
                message,
                body,
            }
        } else {
            HttpError::Server {
                status: code,
                message,
                body,
            }
        }
    }

    /// Read the body of a failed response and build the enhanced error
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(status = status.as_u16(), error = %e, "Failed to read error response body");
                String::new()
            }
        };
        Self::from_status(status, &body)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Client { status, .. } | HttpError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message suitable for showing to the user
    pub fn friendly_message(&self) -> String {
        match self {
            HttpError::Network(_) => NETWORK_MESSAGE.to_string(),
            HttpError::Client { message, .. } | HttpError::Server { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Map a status code to a user-facing message. Unmapped statuses fall back to
/// the server's own message, then to a generic one.
pub fn friendly_message(status: u16, raw: Option<&str>) -> String {
    let mapped = match status {
        400 => "Invalid data sent.",
        401 => "Unauthorized. Please log in again.",
        403 => "Access denied.",
        404 => "Resource not found.",
        422 => "Invalid input.",
        429 => "Too many requests. Please wait and try again.",
        500 | 502 | 503 => "Server unavailable. Please try again later.",
        _ => {
            return raw
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(UNKNOWN_MESSAGE)
                .to_string()
        }
    };
    mapped.to_string()
}

/// The `message` field of a JSON error body, if any
pub(crate) fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Truncate a response body to avoid carrying excessive data
fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_friendly_message_table() {
        assert_eq!(friendly_message(400, None), "Invalid data sent.");
        assert_eq!(friendly_message(401, None), "Unauthorized. Please log in again.");
        assert_eq!(friendly_message(403, None), "Access denied.");
        assert_eq!(friendly_message(404, None), "Resource not found.");
        assert_eq!(friendly_message(422, None), "Invalid input.");
        assert_eq!(
            friendly_message(429, None),
            "Too many requests. Please wait and try again."
        );
        for status in [500, 502, 503] {
            assert_eq!(
                friendly_message(status, Some("boom")),
                "Server unavailable. Please try again later."
            );
        }
    }

    #[test]
    fn test_friendly_message_fallbacks() {
        assert_eq!(friendly_message(409, Some("Email taken")), "Email taken");
        assert_eq!(friendly_message(504, None), "Unknown error.");
        assert_eq!(friendly_message(418, Some("  ")), "Unknown error.");
    }

    #[test]
    fn test_from_status_categorizes() {
        let err = HttpError::from_status(StatusCode::NOT_FOUND, r#"{"message":"No such user"}"#);
        match err {
            HttpError::Client {
                status,
                ref message,
                ref body,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Resource not found.");
                assert!(body.contains("No such user"));
            }
            other => panic!("expected client error, got {other:?}"),
        }

        let err = HttpError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, HttpError::Server { status: 502, .. }));
        assert_eq!(err.friendly_message(), "Server unavailable. Please try again later.");
    }

    #[test]
    fn test_from_status_uses_server_message_when_unmapped() {
        let err = HttpError::from_status(StatusCode::CONFLICT, r#"{"message":"Email taken"}"#);
        assert_eq!(err.friendly_message(), "Email taken");
        assert_eq!(err.status(), Some(409));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_truncate_body() {
        let short = "short";
        assert_eq!(truncate_body(short), "short");

        let long = "é".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"é".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_auth_expired_keeps_source() {
        use std::error::Error;

        let refresh = HttpError::from_status(StatusCode::UNAUTHORIZED, "");
        let err = HttpError::AuthExpired {
            source: Some(Box::new(refresh)),
        };
        assert_eq!(err.friendly_message(), "Session expired. Please log in again.");
        assert!(err.source().is_some());
        assert_eq!(err.status(), None);
    }
}
