//! Device lifecycle tests against the mock transport
//!
//! Time is paused, so the one-second publish interval and the connect
//! timeout run instantly and deterministically.


use cloudiot_device::config::{DeviceConfig, MessageType};
use cloudiot_device::device::{DeviceLifecycle, LogIndicator, SimulatedSensors};
use cloudiot_device::peripheral::{PeripheralHandle, PeripheralReader};
use cloudiot_device::testing::mocks::{MockTransport, RecordingIndicator};
use cloudiot_device::transport::mqtt::ConnectionState;
use cloudiot_device::DeviceError;
use rumqttc::QoS;
use std::io::Cursor;
use std::time::Duration;
use test_helpers::test_config;
use tokio::time::Instant;

fn lifecycle(
    config: DeviceConfig,
    transport: MockTransport,
    indicator: RecordingIndicator,
) -> DeviceLifecycle<MockTransport> {
    DeviceLifecycle::new(
        config,
        transport,
        Box::new(SimulatedSensors::new()),
        PeripheralReader::detached(),
        Box::new(indicator),
    )
}

/// A reader that has already consumed `input`
fn finished_reader(input: &'static str) -> PeripheralHandle {
    let handle = PeripheralReader::spawn(Cursor::new(input)).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    handle
}

#[tokio::test(start_paused = true)]
async fn test_publishes_configured_number_of_messages() {
    let transport = MockTransport::new();
    let summary = lifecycle(test_config(), transport.clone(), RecordingIndicator::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.messages_published, 3);
    assert_eq!(summary.publish_failures, 0);
    assert!(!summary.led_on);
    assert_eq!(summary.final_state, ConnectionState::Disconnected);

    let published = transport.get_published_messages().await;
    assert_eq!(published.len(), 3);
    for (topic, payload, qos) in &published {
        assert_eq!(topic, "/devices/test-device/events");
        assert_eq!(*qos, QoS::AtLeastOnce);
        let json = std::str::from_utf8(payload).unwrap();
        assert!(json.starts_with(r#"{"proximity":0,"luminance":0.0,"accel_x":"#));
        assert!(json.contains(r#""temperature":0.0"#));
    }

    assert_eq!(
        transport.get_subscriptions().await,
        vec![("/devices/test-device/config".to_string(), QoS::AtLeastOnce)]
    );
    assert_eq!(transport.get_disconnect_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_messages_are_spaced_by_interval() {
    let mut config = test_config();
    config.telemetry.num_messages = 4;
    config.telemetry.interval_secs = 2;

    let start = Instant::now();
    lifecycle(config, MockTransport::new(), RecordingIndicator::new())
        .run()
        .await
        .unwrap();

    // Up to one second connecting, then one interval after each message
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(8), "took {elapsed:?}");
    assert!(elapsed <= Duration::from_secs(9), "took {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_state_messages_use_state_topic() {
    let mut config = test_config();
    config.mqtt.message_type = MessageType::State;
    config.telemetry.num_messages = 1;
    let transport = MockTransport::new();

    lifecycle(config, transport.clone(), RecordingIndicator::new())
        .run()
        .await
        .unwrap();

    let published = transport.get_published_messages().await;
    assert_eq!(published[0].0, "/devices/test-device/state");
}

#[tokio::test(start_paused = true)]
async fn test_config_update_switches_led() {
    let transport = MockTransport::new().with_config(&br#"{"led_on": true}"#[..]);
    let indicator = RecordingIndicator::new();

    let summary = lifecycle(test_config(), transport, indicator.clone())
        .run()
        .await
        .unwrap();

    assert!(summary.led_on);
    assert_eq!(indicator.calls(), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn test_refused_subscription_does_not_stop_telemetry() {
    let transport = MockTransport::new().with_granted_qos(0x80);

    let summary = lifecycle(test_config(), transport, RecordingIndicator::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.messages_published, 3);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_aborts_run() {
    let transport = MockTransport::never_connects();

    let start = Instant::now();
    let result = lifecycle(test_config(), transport.clone(), RecordingIndicator::new())
        .run()
        .await;
    let elapsed = start.elapsed();

    assert!(matches!(
        result,
        Err(DeviceError::ConnectTimeout { timeout_secs: 5 })
    ));
    assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    assert!(transport.get_published_messages().await.is_empty());
    assert!(transport.get_subscriptions().await.is_empty());
    assert_eq!(transport.get_disconnect_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_connection_times_out() {
    let result = lifecycle(test_config(), MockTransport::refused(), RecordingIndicator::new())
        .run()
        .await;

    assert!(matches!(result, Err(DeviceError::ConnectTimeout { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_publish_failures_do_not_halt_loop() {
    let transport = MockTransport::with_publish_failure();

    let summary = lifecycle(test_config(), transport.clone(), RecordingIndicator::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.messages_published, 0);
    assert_eq!(summary.publish_failures, 3);
    assert_eq!(transport.get_disconnect_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_messages_connects_and_disconnects() {
    let mut config = test_config();
    config.telemetry.num_messages = 0;
    let transport = MockTransport::new();

    let summary = lifecycle(config, transport.clone(), RecordingIndicator::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.messages_published, 0);
    assert!(transport.get_published_messages().await.is_empty());
    assert_eq!(transport.get_subscriptions().await.len(), 1);
    assert_eq!(transport.get_disconnect_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_early_and_disconnects() {
    let mut config = test_config();
    config.telemetry.num_messages = 10;
    let transport = MockTransport::new();

    let summary = lifecycle(config, transport.clone(), RecordingIndicator::new())
        .run_until(tokio::time::sleep(Duration::from_millis(1500)))
        .await
        .unwrap();

    assert!(
        (1..=2).contains(&summary.messages_published),
        "published {}",
        summary.messages_published
    );
    assert_eq!(transport.get_disconnect_count().await, 1);
    assert_eq!(summary.final_state, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_connecting_skips_telemetry() {
    let transport = MockTransport::never_connects();

    let summary = lifecycle(test_config(), transport.clone(), RecordingIndicator::new())
        .run_until(tokio::time::sleep(Duration::from_secs(2)))
        .await
        .unwrap();

    assert_eq!(summary.messages_published, 0);
    assert!(transport.get_subscriptions().await.is_empty());
    assert_eq!(transport.get_disconnect_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_peripheral_reading_is_merged_into_payload() {
    let mut config = test_config();
    config.telemetry.num_messages = 1;
    let transport = MockTransport::new();
    let peripheral = finished_reader("BME680: 22.5 C, 1013.2 hPa, 41 %, 12.4 KOhms, 102.3 m\n");

    DeviceLifecycle::new(
        config,
        transport.clone(),
        Box::new(SimulatedSensors::new()),
        peripheral,
        Box::new(LogIndicator),
    )
    .run()
    .await
    .unwrap();

    let published = transport.get_published_messages().await;
    let value: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(value["temperature"], 22.5);
    assert_eq!(value["pressure"], 1013.2);
    assert_eq!(value["humidity"], 41.0);
    assert_eq!(value["gas_resistance"], 12.4);
    assert_eq!(value["altitude"], 102.3);
    assert_eq!(value["accel_z"], 1.0);
}
