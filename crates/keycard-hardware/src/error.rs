//! Error types for hardware operations.
//!
//! Covers the indicator devices (LP5662 driver, indicator scripts) and the
//! tag presence sources. None of these errors is fatal to the service once
//! it is running; they are logged and the affected operation is skipped.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or its event stream has ended.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Tag reading error.
    #[error("Tag read error: {message}")]
    TagReadError { message: String },

    /// External indicator script failed.
    #[error("Script {script} failed: {message}")]
    ScriptFailed { script: String, message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new tag read error.
    pub fn tag_read(message: impl Into<String>) -> Self {
        Self::TagReadError {
            message: message.into(),
        }
    }

    /// Create a new script failure error.
    pub fn script_failed(script: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScriptFailed {
            script: script.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the device is gone for good.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("PN7150");
        assert!(error.is_disconnected());
        assert_eq!(error.to_string(), "Device disconnected: PN7150");
    }

    #[test]
    fn test_tag_read_error() {
        let error = HardwareError::tag_read("short GET DATA response");
        assert!(!error.is_disconnected());
        assert_eq!(error.to_string(), "Tag read error: short GET DATA response");
    }

    #[test]
    fn test_script_failed_error() {
        let error = HardwareError::script_failed("/usr/bin/greenled.sh", "exit status: 1");
        assert!(!error.is_disconnected());
        assert_eq!(
            error.to_string(),
            "Script /usr/bin/greenled.sh failed: exit status: 1"
        );
    }

    #[test]
    fn test_initialization_failed_error() {
        let error = HardwareError::initialization_failed("reset failed");
        assert_eq!(error.to_string(), "Initialization failed: reset failed");
    }
}
