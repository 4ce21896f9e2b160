//! MQTT client for the cloud IoT bridge
//!
//! The module separates pure functions from I/O operations:
//!
//! - [`connection`] - Connection state, client options and topic construction
//! - [`message_handler`] - Mapping of `rumqttc` events to [`DeviceEvent`]s
//! - [`client`] - The event loop task and request I/O
//!
//! # Usage
//!
//! ```rust,no_run
//! use cloudiot_device::config::DeviceConfig;
//! use cloudiot_device::transport::{mqtt::MqttClient, Transport};
//! use tokio::sync::mpsc;
//!
//! # tokio_test_block_on(async {
//! let config = DeviceConfig::default();
//! let mut client = MqttClient::new(&config, "signed-jwt")?;
//! let (events_tx, mut events_rx) = mpsc::channel(32);
//! client.connect(events_tx).await?;
//! while let Some(event) = events_rx.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```
//!
//! [`DeviceEvent`]: crate::transport::DeviceEvent

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::{configure_mqtt_options, ConnectionState, MqttError, TopicBuilder};
pub use message_handler::{EventRoute, MessageHandler};
