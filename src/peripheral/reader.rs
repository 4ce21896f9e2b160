//! Background reader for the sensor board
//!
//! Serial reads block, so the reader runs on a dedicated OS thread rather
//! than a tokio task. It owns the port; the only thing that crosses threads
//! is the latest [`PeripheralReading`], published on a `watch` channel.

use super::parser::parse_sensor_line;
use super::PeripheralReading;
use crate::config::PeripheralSection;
use std::io::{self, BufRead, BufReader, ErrorKind};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Read timeout on the serial port; timeouts are retried
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(500);

const READER_THREAD_NAME: &str = "peripheral-reader";

#[derive(Debug, Error)]
pub enum PeripheralError {
    #[error("Failed to open serial port {port}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("Failed to start reader thread")]
    Spawn(#[source] io::Error),
}

/// Entry points for starting a peripheral reader
pub struct PeripheralReader;

impl PeripheralReader {
    /// Start a reader thread over any line source
    pub fn spawn<R>(source: R) -> Result<PeripheralHandle, PeripheralError>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = watch::channel(PeripheralReading::default());
        let thread = thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || read_lines(source, tx))
            .map_err(PeripheralError::Spawn)?;

        Ok(PeripheralHandle {
            receiver: rx,
            thread: Some(thread),
        })
    }

    /// Open a serial device and start reading from it
    pub fn open_serial(port: &str, baud_rate: u32) -> Result<PeripheralHandle, PeripheralError> {
        info!("Opening sensor board on {} at {} baud", port, baud_rate);
        let serial = serialport::new(port, baud_rate)
            .timeout(SERIAL_READ_TIMEOUT)
            .open()
            .map_err(|source| PeripheralError::Open {
                port: port.to_string(),
                source,
            })?;

        Self::spawn(BufReader::new(serial))
    }

    /// Open the configured board, or a detached handle when it is disabled
    pub fn from_config(config: &PeripheralSection) -> Result<PeripheralHandle, PeripheralError> {
        if config.enabled {
            Self::open_serial(&config.port, config.baud_rate)
        } else {
            info!("No sensor board attached, reporting zero readings");
            Ok(Self::detached())
        }
    }

    /// A handle for a device without a sensor board
    ///
    /// Always reports the all-zero reading.
    pub fn detached() -> PeripheralHandle {
        let (_tx, rx) = watch::channel(PeripheralReading::default());
        PeripheralHandle {
            receiver: rx,
            thread: None,
        }
    }
}

/// Receiving side of a peripheral reader
pub struct PeripheralHandle {
    receiver: watch::Receiver<PeripheralReading>,
    thread: Option<JoinHandle<()>>,
}

impl PeripheralHandle {
    /// The most recent valid reading
    pub fn latest(&self) -> PeripheralReading {
        *self.receiver.borrow()
    }

    /// A new receiver for the reading channel
    pub fn subscribe(&self) -> watch::Receiver<PeripheralReading> {
        self.receiver.clone()
    }

    /// Whether a reader thread was started for this handle
    pub fn is_attached(&self) -> bool {
        self.thread.is_some()
    }

    /// Whether the reader thread has ended
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Drop the channel and wait for the reader thread to end
    ///
    /// The thread notices the dropped channel on its next line or read
    /// timeout, or stops at end of stream. This blocks; call it from
    /// `spawn_blocking` inside a runtime.
    pub fn join(self) {
        let PeripheralHandle { receiver, thread } = self;
        drop(receiver);
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!("Peripheral reader thread panicked");
            }
        }
    }
}

fn read_lines<R: BufRead>(mut source: R, tx: watch::Sender<PeripheralReading>) {
    let mut buf = Vec::new();

    loop {
        match source.read_until(b'\n', &mut buf) {
            Ok(0) => {
                if !buf.is_empty() {
                    handle_line(&buf, &tx);
                }
                info!("Sensor board stream ended");
                break;
            }
            Ok(_) => {
                // A timeout can split a line; keep accumulating until the terminator
                if buf.last() != Some(&b'\n') {
                    continue;
                }
                let keep_going = handle_line(&buf, &tx);
                buf.clear();
                if !keep_going {
                    debug!("No readers left, stopping peripheral reader");
                    break;
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                if tx.is_closed() {
                    debug!("No readers left, stopping peripheral reader");
                    break;
                }
            }
            Err(e) => {
                error!("Sensor board read failed: {}", e);
                break;
            }
        }
    }
}

/// Parse and publish one raw line; false once nobody is listening
fn handle_line(raw: &[u8], tx: &watch::Sender<PeripheralReading>) -> bool {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => {
            warn!("Skipping non UTF-8 sensor line: {}", e);
            return !tx.is_closed();
        }
    };

    match parse_sensor_line(line) {
        Ok(reading) => {
            debug!(?reading, "Sensor board reading");
            tx.send(reading).is_ok()
        }
        Err(e) => {
            warn!("Skipping malformed sensor line {:?}: {}", line.trim_end(), e);
            !tx.is_closed()
        }
    }
}
