//! The device itself: session state, on-board hardware and the main loop

pub mod indicator;
pub mod lifecycle;
pub mod sensors;
pub mod session;

pub use indicator::{Indicator, IndicatorError, LogIndicator};
pub use lifecycle::{DeviceLifecycle, RunSummary};
pub use sensors::{LocalReading, LocalSensors, Motion, SimulatedSensors};
pub use session::{run_session, ConfigOutcome, ConfigUpdate, ConnectionMonitor, DeviceSession};
