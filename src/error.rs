//! Error types for the device
//!
//! Each concern defines its own error enum next to its code; `DeviceError`
//! aggregates them for the lifecycle and the binary.

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::peripheral::PeripheralError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for device operations
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),

    #[error("Peripheral error: {0}")]
    Peripheral(#[from] PeripheralError),

    #[error("Transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    #[error("Not connected to the bridge after {timeout_secs} seconds")]
    ConnectTimeout { timeout_secs: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl DeviceError {
    /// Wrap an error raised by a [`crate::transport::Transport`] implementation
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(error))
    }

    /// Create connect timeout error
    pub fn connect_timeout(timeout_secs: u64) -> Self {
        Self::ConnectTimeout { timeout_secs }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;
