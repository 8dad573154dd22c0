use keycard_hardware::HardwareError;
use keycard_storage::StorageError;
use thiserror::Error;

/// Errors that stop the keycard service.
///
/// Per-card failures (persistence, notification, indicator) are logged where
/// they happen and never surface here.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The credential store could not be opened
    #[error("Credential store unavailable: {0}")]
    Storage(#[from] StorageError),

    /// A presence source or peripheral could not be set up
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// The presence source went away for good
    #[error("Presence source closed: {0}")]
    PresenceClosed(#[source] HardwareError),

    /// Internal mode bookkeeping went wrong
    #[error(transparent)]
    Core(#[from] keycard_core::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn config(message: impl Into<String>) -> Self {
        ServiceError::Config(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_closed_keeps_source() {
        let err = ServiceError::PresenceClosed(HardwareError::disconnected("stdin"));
        assert!(err.to_string().starts_with("Presence source closed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_helper() {
        let err = ServiceError::config("departure threshold must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: departure threshold must be positive"
        );
    }
}
