//! Interfaces the sweep controller needs from the bench instruments.

use std::thread;
use std::time::Duration;

use crate::serial_terminal::ScpiTerminalError;

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("Terminal error: {0}")]
    Terminal(#[from] ScpiTerminalError),

    #[error("Unexpected response '{response}' to '{command}'")]
    InvalidResponse { command: String, response: String },

    #[error("Instrument driver error: {0}")]
    Driver(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Oscilloscope acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Every trigger produces a fresh, unaveraged record.
    Normal,
    /// Records are averaged in hardware over the configured count.
    Average,
}

/// Oscilloscope input channel, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel(u8);

impl Channel {
    pub const CH1: Channel = Channel(1);
    pub const CH2: Channel = Channel(2);

    pub fn new(number: u8) -> Self {
        Self(number.max(1))
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::CH1
    }
}

/// A signal generator able to hold a continuous sinusoid until reconfigured.
pub trait SignalSource {
    fn drive_sinusoid(
        &mut self,
        amplitude: f64,
        frequency: f64,
        offset: f64,
    ) -> Result<(), InstrumentError>;
}

/// The oscilloscope commands used by a sweep.
///
/// Measurements return volts. A reading above [`crate::OVERFLOW_THRESHOLD`] means
/// the trace is clipped or lost.
pub trait Oscilloscope {
    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), InstrumentError>;

    fn set_averaging_count(&mut self, count: u32) -> Result<(), InstrumentError>;

    /// Volts per division.
    fn set_channel_vertical_gain(&mut self, channel: Channel, volts: f64)
        -> Result<(), InstrumentError>;

    fn set_channel_vertical_offset(
        &mut self,
        channel: Channel,
        volts: f64,
    ) -> Result<(), InstrumentError>;

    /// Seconds per division.
    fn set_timebase(&mut self, seconds: f64) -> Result<(), InstrumentError>;

    fn measure_peak_to_peak(&mut self, channel: Channel) -> Result<f64, InstrumentError>;

    fn measure_average(&mut self, channel: Channel) -> Result<f64, InstrumentError>;

    fn auto_range(&mut self) -> Result<(), InstrumentError>;

    fn close(&mut self) -> Result<(), InstrumentError>;
}

impl<T: SignalSource + ?Sized> SignalSource for Box<T> {
    fn drive_sinusoid(
        &mut self,
        amplitude: f64,
        frequency: f64,
        offset: f64,
    ) -> Result<(), InstrumentError> {
        (**self).drive_sinusoid(amplitude, frequency, offset)
    }
}

impl<T: Oscilloscope + ?Sized> Oscilloscope for Box<T> {
    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), InstrumentError> {
        (**self).set_acquisition_mode(mode)
    }

    fn set_averaging_count(&mut self, count: u32) -> Result<(), InstrumentError> {
        (**self).set_averaging_count(count)
    }

    fn set_channel_vertical_gain(
        &mut self,
        channel: Channel,
        volts: f64,
    ) -> Result<(), InstrumentError> {
        (**self).set_channel_vertical_gain(channel, volts)
    }

    fn set_channel_vertical_offset(
        &mut self,
        channel: Channel,
        volts: f64,
    ) -> Result<(), InstrumentError> {
        (**self).set_channel_vertical_offset(channel, volts)
    }

    fn set_timebase(&mut self, seconds: f64) -> Result<(), InstrumentError> {
        (**self).set_timebase(seconds)
    }

    fn measure_peak_to_peak(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        (**self).measure_peak_to_peak(channel)
    }

    fn measure_average(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        (**self).measure_average(channel)
    }

    fn auto_range(&mut self) -> Result<(), InstrumentError> {
        (**self).auto_range()
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        (**self).close()
    }
}

/// The pair of instruments a sweep runs on.
pub struct InstrumentHandles<S, O> {
    pub source: S,
    pub scope: O,
}

impl<S: SignalSource, O: Oscilloscope> InstrumentHandles<S, O> {
    pub fn new(source: S, scope: O) -> Self {
        Self { source, scope }
    }
}

/// Blocking wait between instrument commands.
pub trait Delay {
    fn wait(&mut self, duration: Duration);
}

/// Waits by putting the calling thread to sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn wait(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}
