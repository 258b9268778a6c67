use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized{}", reason_suffix(.0))]
    Unauthorized(Option<String>),

    #[error("Access denied{}", reason_suffix(.0))]
    AccessDenied(Option<String>),

    #[error("Resource not found{}", reason_suffix(.0))]
    NotFound(Option<String>),

    #[error("Request rejected ({status}){}", reason_suffix(.reason))]
    Rejected {
        status: StatusCode,
        reason: Option<String>,
    },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {}", server_detail(.reason, .body))]
    ServerError {
        reason: Option<String>,
        body: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(": {}", r),
        None => String::new(),
    }
}

fn server_detail<'a>(reason: &'a Option<String>, body: &'a str) -> &'a str {
    reason.as_deref().unwrap_or(body)
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let reason = extract_reason(body);
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(reason),
            403 => ApiError::AccessDenied(reason),
            404 => ApiError::NotFound(reason),
            429 => ApiError::RateLimited,
            400..=499 => ApiError::Rejected { status, reason },
            500..=599 => ApiError::ServerError {
                reason,
                body: truncated,
            },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// The remote authority no longer honors the presented token.
    pub fn is_authorization_rejection(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// The server answered and refused the request (as opposed to being
    /// unreachable or broken).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized(_)
                | ApiError::AccessDenied(_)
                | ApiError::NotFound(_)
                | ApiError::Rejected { .. }
        )
    }

    /// Human-readable reason carried by the error payload, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(reason)
            | ApiError::AccessDenied(reason)
            | ApiError::NotFound(reason)
            | ApiError::Rejected { reason, .. }
            | ApiError::ServerError { reason, .. } => reason.as_deref(),
            ApiError::RateLimited | ApiError::NetworkError(_) | ApiError::InvalidResponse(_) => None,
        }
    }
}

/// Pull the human-readable reason out of an error payload.
///
/// Understands `{"detail": "..."}`, `{"message": "..."}`, `{"error": "..."}`
/// and the validation form `{"detail": [{"msg": "..."}]}`.
pub fn extract_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let reason = ["detail", "message", "error"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(|field| match field {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items
                .iter()
                .find_map(|item| item.get("msg").and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })?;
    let reason = reason.trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}
