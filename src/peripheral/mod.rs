//! Remote sensor board attached over a serial line
//!
//! The board streams environmental readings as text lines. A background
//! reader thread parses them and keeps the latest reading available to the
//! telemetry loop through a `watch` channel.

pub mod parser;
pub mod reader;

pub use parser::{parse_sensor_line, ParseError};
pub use reader::{PeripheralError, PeripheralHandle, PeripheralReader};

/// Latest environmental reading from the sensor board
///
/// All values are zero until the first valid line arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeripheralReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Hectopascal
    pub pressure: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Kiloohm
    pub gas_resistance: f64,
    /// Metres
    pub altitude: f64,
}

impl PeripheralReading {
    /// Values in board output order
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.temperature,
            self.pressure,
            self.humidity,
            self.gas_resistance,
            self.altitude,
        ]
    }
}
