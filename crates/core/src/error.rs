//! Core error types for q3query

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    // Transport layer. The caller may retry these; nothing in the library does.
    #[error("Connection attempt to {address} timed out")]
    ConnectTimeout { address: String },

    #[error("Failed to connect to {address} ({reason})")]
    Connect { address: String, reason: String },

    #[error("Failed to send data to server: {0}")]
    Send(String),

    #[error("Timed out while receiving server data")]
    ReceiveTimeout,

    #[error("Failed to receive data from server: {0}")]
    Receive(String),

    // Buffer level, caused by truncated or malformed input
    #[error("Attempt to read {requested} bytes with only {remaining} remaining")]
    BufferUnderrun { requested: usize, remaining: usize },

    #[error("Expected string delimiters were not found")]
    DelimiterNotFound,

    // Decode level, the peer does not speak the expected protocol
    #[error("Principal returned invalid data: {0}")]
    InvalidDirectoryData(String),

    #[error("Server returned invalid packet header")]
    InvalidStatusHeader,

    #[error("Server returned invalid packet body: {0}")]
    InvalidStatusBody(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryError {
    /// Transport failures are worth another attempt, malformed data is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::Connect { .. }
                | Self::Send(_)
                | Self::ReceiveTimeout
                | Self::Receive(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. } | Self::ReceiveTimeout)
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(QueryError::ReceiveTimeout.is_retryable());
        assert!(QueryError::Send("broken pipe".into()).is_retryable());
        assert!(QueryError::ConnectTimeout { address: "127.0.0.1:27960".into() }.is_retryable());

        assert!(!QueryError::InvalidStatusHeader.is_retryable());
        assert!(!QueryError::DelimiterNotFound.is_retryable());
        assert!(!QueryError::BufferUnderrun { requested: 4, remaining: 1 }.is_retryable());
    }

    #[test]
    fn test_timeout_classification() {
        assert!(QueryError::ReceiveTimeout.is_timeout());
        assert!(!QueryError::Receive("reset".into()).is_timeout());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            QueryError::InvalidDirectoryData("missing header".into()).to_string(),
            "Principal returned invalid data: missing header"
        );
        assert_eq!(
            QueryError::InvalidStatusHeader.to_string(),
            "Server returned invalid packet header"
        );
    }
}
