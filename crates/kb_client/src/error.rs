use thiserror::Error;

/// Failure below the envelope: the request never produced a usable response.
///
/// Every variant carries a rendered message instead of the source error so the
/// type stays `Clone`; a shared refresh outcome is handed to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("malformed response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Connect(message)
        } else if err.is_body() {
            TransportError::Body(message)
        } else if err.is_decode() {
            TransportError::Decode(message)
        } else {
            TransportError::Request(message)
        }
    }
}

impl From<reqwest_middleware::Error> for TransportError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            reqwest_middleware::Error::Middleware(err) => TransportError::Request(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("credential store I/O failed: {0}")]
    Io(String),

    #[error("credential store serialization failed: {0}")]
    Serialize(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialize(err.to_string())
    }
}

/// Errors of a streaming session. These reach the caller only through
/// [`StreamHandler::on_error`](crate::stream::StreamHandler::on_error).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("stream carried invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("server reported a stream error: {0}")]
    Server(String),

    #[error("stream line exceeded {limit} bytes without a newline")]
    LineTooLong { limit: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("authentication expired; stored session was cleared")]
    AuthenticationExpired,

    #[error("no refresh token is stored")]
    MissingRefreshToken,

    #[error("refresh rejected by server (code {code}): {message}")]
    RefreshRejected { code: i32, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("call was cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn is_authentication_expired(&self) -> bool {
        matches!(self, ClientError::AuthenticationExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_shared_by_value() {
        let err = ClientError::from(TransportError::Timeout("10s elapsed".to_string()));
        let copy = err.clone();
        assert_eq!(err, copy);
        assert_eq!(copy.to_string(), "request timed out: 10s elapsed");
    }

    #[test]
    fn store_errors_convert_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: ClientError = StoreError::from(io).into();
        assert!(matches!(err, ClientError::Store(StoreError::Io(msg)) if msg.contains("read-only")));
    }
}
