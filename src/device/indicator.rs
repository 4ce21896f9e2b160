//! The device's actuator: a single LED
//!
//! Configuration updates switch it on and off. There is no GPIO driver here;
//! [`LogIndicator`] reports the switch in the log, and other implementations
//! can be injected into the session.

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("Indicator unavailable: {0}")]
    Unavailable(String),
}

/// Something that can be switched on and off
pub trait Indicator: Send {
    fn set(&mut self, on: bool) -> Result<(), IndicatorError>;
}

/// Indicator that only logs its state changes
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) -> Result<(), IndicatorError> {
        if on {
            info!("Led turned on.");
        } else {
            info!("Led turned off.");
        }
        Ok(())
    }
}
