//! On-board sensors: accelerometer, proximity and ambient light
//!
//! The board has no driver in this crate, so [`SimulatedSensors`] stands in
//! for it. Proximity and luminance read zero; the accelerometer reports a
//! device lying flat with a small wobble.

/// Accelerometer reading in g
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Motion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One poll of the on-board sensors
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalReading {
    pub proximity: u16,
    pub luminance: f64,
    pub motion: Motion,
}

/// Source of on-board readings, polled once per telemetry iteration
pub trait LocalSensors: Send {
    fn poll(&mut self) -> LocalReading;
}

/// Amplitude of the simulated wobble, in g
const WOBBLE: f64 = 0.02;

/// Software stand-in for the on-board sensors
#[derive(Debug, Default)]
pub struct SimulatedSensors {
    tick: u64,
}

impl SimulatedSensors {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalSensors for SimulatedSensors {
    fn poll(&mut self) -> LocalReading {
        let phase = self.tick as f64 * 0.5;
        self.tick = self.tick.wrapping_add(1);

        LocalReading {
            proximity: 0,
            luminance: 0.0,
            motion: Motion {
                x: WOBBLE * phase.sin(),
                y: WOBBLE * phase.cos(),
                z: 1.0,
            },
        }
    }
}
