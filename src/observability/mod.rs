//! Observability for the device
//!
//! Structured logging with `tracing`, configured from the environment.

pub mod logging;

// Re-export for convenience
pub use logging::{init_logging, init_logging_with_verbosity, LogFormat};

// Span macros for structured logging
pub use logging::{lifecycle_span, mqtt_span, telemetry_span};
