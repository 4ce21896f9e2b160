//! Parsing of sensor board output lines
//!
//! The board prints lines such as `BME680: 22.51 C, 1013.2 hPa, 41.0 %, 12.4 KOhms, 102.3 m`.
//! Everything up to the first colon is a label; the five numbers after it are
//! taken positionally, whatever separates them.

use super::PeripheralReading;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// ASCII integers or decimals, optionally signed
static NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?(?:[0-9]*\.[0-9]+|[0-9]+)").unwrap());

/// Number of readings on every board line
pub const FIELD_COUNT: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Expected {FIELD_COUNT} numeric fields, found {found}")]
    FieldCount { found: usize },
    #[error("Invalid number '{value}'")]
    InvalidNumber {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

/// Parse one line of board output into a reading
pub fn parse_sensor_line(line: &str) -> Result<PeripheralReading, ParseError> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    let fields = line.split_once(':').map_or(line, |(_, rest)| rest);

    let values = NUMBER_PATTERN
        .find_iter(fields)
        .map(|m| {
            m.as_str()
                .parse::<f64>()
                .map_err(|source| ParseError::InvalidNumber {
                    value: m.as_str().to_string(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    match values[..] {
        [temperature, pressure, humidity, gas_resistance, altitude] => Ok(PeripheralReading {
            temperature,
            pressure,
            humidity,
            gas_resistance,
            altitude,
        }),
        _ => Err(ParseError::FieldCount {
            found: values.len(),
        }),
    }
}
