//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the device without
//! an MQTT bridge or sensor hardware.

pub mod mocks;

pub use mocks::*;
