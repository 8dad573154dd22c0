//! Errors raised while publishing authentication events.

/// Result type alias for notifier operations.
pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur while talking to the notification sink.
///
/// None of these affect an authentication outcome; callers log them.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Client is not connected to the server
    #[error("Not connected to server")]
    NotConnected,

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Read operation timed out
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Server answered a command with an error reply
    #[error("Server error: {0}")]
    Server(String),

    /// Malformed RESP data
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotifyError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether the connection must be dropped after this error.
    ///
    /// Only a server error reply leaves the stream in a known state.
    pub fn breaks_connection(&self) -> bool {
        !matches!(self, Self::Server(_))
    }
}
