use reqwest::StatusCode;
use serde_json::Value;

/// Why a backend call did not produce a usable answer. Only ever logged;
/// public client methods collapse every variant into a sentinel result.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Connection refused, DNS, timeout.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer; `detail` carries the body's `error`/`detail` field when present.
    #[error("HTTP {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    /// The body was not JSON or not shaped as expected.
    #[error("unexpected response: {0}")]
    Unexpected(String),

    #[error("superadmin credentials are not configured")]
    MissingCredentials,
}

impl CallError {
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Transport(e) if e.is_timeout() => "timeout",
            CallError::Transport(_) => "transport",
            CallError::Status { .. } => "protocol",
            CallError::Unexpected(_) => "unexpected",
            CallError::MissingCredentials => "config",
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            CallError::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }

    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("detail"))
                    .map(|d| match d {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
            })
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    "no details".to_string()
                } else {
                    body.chars().take(200).collect()
                }
            });
        CallError::Status { status, detail }
    }
}
