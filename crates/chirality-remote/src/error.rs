//! Transport errors

/// Failures talking to a chat-completions endpoint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response within the per-attempt timeout
    #[error("request timed out")]
    Timeout,

    /// Could not reach the endpoint
    #[error("connection failed: {0}")]
    Connect(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not a usable completion
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client construction or request building failed
    #[error("http client error: {0}")]
    Client(String),
}

impl TransportError {
    /// True for conditions worth retrying: timeouts, connection
    /// failures, HTTP 429 and 5xx
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::InvalidResponse(_) | Self::Client(_) => false,
        }
    }
}

// Conversion from reqwest::Error
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Client(err.to_string())
        }
    }
}
