//! cloudiot-device
//!
//! A sample IoT device for a Cloud IoT Core style MQTT bridge. It
//! authenticates with a signed JWT, publishes sensor telemetry at a fixed
//! interval, and switches an LED when the cloud pushes a configuration
//! update.
//!
//! # Overview
//!
//! - [`auth`]: connection tokens signed with RS256 or ES256
//! - [`transport`]: the bridge connection, reporting broker traffic as [`DeviceEvent`]s
//! - [`device`]: session state, on-board sensors and the main loop
//! - [`peripheral`]: the serial sensor board reader
//! - [`telemetry`]: the outbound payload
//!
//! # Quick Start
//!
//! ```no_run
//! use cloudiot_device::device::{DeviceLifecycle, LogIndicator, SimulatedSensors};
//! use cloudiot_device::peripheral::PeripheralReader;
//! use cloudiot_device::{create_jwt, DeviceConfig, MqttClient};
//!
//! # async fn run(config: DeviceConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let token = create_jwt(
//!     &config.device.project_id,
//!     &config.auth.private_key_file,
//!     config.auth.algorithm,
//! )?;
//! let transport = MqttClient::new(&config, &token)?;
//!
//! let summary = DeviceLifecycle::new(
//!     config,
//!     transport,
//!     Box::new(SimulatedSensors::new()),
//!     PeripheralReader::detached(),
//!     Box::new(LogIndicator),
//! )
//! .run()
//! .await?;
//! println!("published {} messages", summary.messages_published);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod observability;
pub mod peripheral;
pub mod telemetry;
pub mod testing;
pub mod transport;

pub use auth::{create_jwt, JwtAlgorithm};
pub use config::*;
pub use device::{DeviceLifecycle, RunSummary};
pub use error::{DeviceError, DeviceResult};
pub use telemetry::TelemetryPayload;
pub use transport::mqtt::MqttClient;
pub use transport::{DeviceEvent, Transport};
