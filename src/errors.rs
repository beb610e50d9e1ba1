pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("{operation} {endpoint} failed: {source}")]
    Request {
        operation: &'static str,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} {endpoint} returned {status}: {message}")]
    Status {
        operation: &'static str,
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn request(operation: &'static str, endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            operation,
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn status(
        operation: &'static str,
        endpoint: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Status {
            operation,
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }

    /// Short machine-readable kind, used in log fields and notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Cancelled => "cancelled",
            AppError::Request { .. } => "request",
            AppError::Status { .. } => "status",
            AppError::Decode(_) => "decode",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_carries_operation_and_endpoint() {
        let err = AppError::status("search", "http://api/positions", 500, "boom");
        assert_eq!(err.to_string(), "search http://api/positions returned 500: boom");
        assert_eq!(err.kind(), "status");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_is_distinguished() {
        assert!(AppError::Cancelled.is_cancelled());
        assert_eq!(AppError::Cancelled.kind(), "cancelled");
    }
}
