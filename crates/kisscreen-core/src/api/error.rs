use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Token cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Token renewal failed: {0}")]
    Renewal(#[source] Box<ApiError>),

    #[error("Business error {code}: {message}")]
    BusinessStatus { code: String, message: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn renewal(cause: ApiError) -> Self {
        ApiError::Renewal(Box::new(cause))
    }

    /// Renewal failures are the only errors the fail-soft search path lets through.
    pub fn is_renewal(&self) -> bool {
        matches!(self, ApiError::Renewal(_))
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ApiError::Network(e) => e.is_timeout(),
            ApiError::Renewal(cause) => cause.is_timeout(),
            _ => false,
        }
    }
}
