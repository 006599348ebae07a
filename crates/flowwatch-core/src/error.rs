use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowwatchError {
    // Transport errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Session errors
    #[error("Operation already in progress: {0}")]
    Busy(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowwatchError {
    /// Whether a later attempt at the same read may succeed without any
    /// change on the caller's side.
    pub fn is_transient(&self) -> bool {
        match self {
            FlowwatchError::Http(_) | FlowwatchError::Decode(_) => true,
            FlowwatchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FlowwatchError::Http("connection refused".into()).is_transient());
        assert!(FlowwatchError::Decode("expected value".into()).is_transient());
        assert!(FlowwatchError::Status { status: 503, body: String::new() }.is_transient());
        assert!(FlowwatchError::Status { status: 429, body: String::new() }.is_transient());

        assert!(!FlowwatchError::Status { status: 404, body: String::new() }.is_transient());
        assert!(!FlowwatchError::NotFound("run".into()).is_transient());
        assert!(!FlowwatchError::Config("bad".into()).is_transient());
    }
}
