use thiserror::Error;

/// Failures talking to the backend.
///
/// Callers never let these reach the graph: a failed call leaves the model
/// exactly as it was.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("invalid remote configuration: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Config(_) | RemoteError::Decode(_) => false,
        }
    }

    /// Short message suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            RemoteError::Status { body, .. } if !body.trim().is_empty() => {
                extract_detail(body).unwrap_or_else(|| body.trim().to_string())
            }
            other => other.to_string(),
        }
    }
}

/// Backends usually wrap errors as `{"detail": "..."}`.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(|d| d.as_str())
        .map(str::to_string)
}
