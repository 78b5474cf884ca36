use serialport::SerialPort;
use std::io::{Read, Write};

use crate::instrument::{AcquisitionMode, Channel, InstrumentError, Oscilloscope};
use crate::serial_terminal::ScpiTerminal;

/// Rigol DS1000-series oscilloscope on its RS-232 port.
///
/// Invalid measurements come back as `9.9E37`, which the sweep treats as a lost signal.
#[derive(Debug)]
pub struct RigolScope<P = Box<dyn SerialPort>> {
    terminal: ScpiTerminal<P>,
}

impl<P: Read + Write> RigolScope<P> {
    pub fn new(terminal: ScpiTerminal<P>) -> Self {
        Self { terminal }
    }

    fn query_volts(&mut self, command: &str) -> Result<f64, InstrumentError> {
        let response = self.terminal.query(command)?;
        response
            .parse::<f64>()
            .map_err(|_| InstrumentError::InvalidResponse {
                command: command.to_string(),
                response,
            })
    }
}

impl<P: Read + Write> Oscilloscope for RigolScope<P> {
    fn set_acquisition_mode(&mut self, mode: AcquisitionMode) -> Result<(), InstrumentError> {
        let mode = match mode {
            AcquisitionMode::Normal => "NORMal",
            AcquisitionMode::Average => "AVERage",
        };
        self.terminal.write(&format!(":ACQuire:TYPE {}", mode))?;
        Ok(())
    }

    fn set_averaging_count(&mut self, count: u32) -> Result<(), InstrumentError> {
        self.terminal.write(&format!(":ACQuire:AVERages {}", count))?;
        Ok(())
    }

    fn set_channel_vertical_gain(
        &mut self,
        channel: Channel,
        volts: f64,
    ) -> Result<(), InstrumentError> {
        self.terminal
            .write(&format!(":CHANnel{}:SCALe {:e}", channel.number(), volts))?;
        Ok(())
    }

    fn set_channel_vertical_offset(
        &mut self,
        channel: Channel,
        volts: f64,
    ) -> Result<(), InstrumentError> {
        self.terminal
            .write(&format!(":CHANnel{}:OFFSet {:e}", channel.number(), volts))?;
        Ok(())
    }

    fn set_timebase(&mut self, seconds: f64) -> Result<(), InstrumentError> {
        self.terminal.write(&format!(":TIMebase:SCALe {:e}", seconds))?;
        Ok(())
    }

    fn measure_peak_to_peak(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        self.query_volts(&format!(":MEASure:VPP? CHANnel{}", channel.number()))
    }

    fn measure_average(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        self.query_volts(&format!(":MEASure:VAVerage? CHANnel{}", channel.number()))
    }

    fn auto_range(&mut self) -> Result<(), InstrumentError> {
        self.terminal.write(":AUToscale")?;
        Ok(())
    }

    /// Hand the front panel back to the user.
    fn close(&mut self) -> Result<(), InstrumentError> {
        self.terminal.write(":KEY:FORCe")?;
        Ok(())
    }
}
