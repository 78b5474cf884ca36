use serialport::SerialPort;
use std::io::{Read, Write};

use crate::instrument::{InstrumentError, SignalSource};
use crate::serial_terminal::ScpiTerminal;

/// Function generator that understands the SCPI `APPLy` shorthand.
#[derive(Debug)]
pub struct ScpiGenerator<P = Box<dyn SerialPort>> {
    terminal: ScpiTerminal<P>,
    output_enabled: bool,
}

impl<P: Read + Write> ScpiGenerator<P> {
    pub fn new(terminal: ScpiTerminal<P>) -> Self {
        Self {
            terminal,
            output_enabled: false,
        }
    }
}

impl<P: Read + Write> SignalSource for ScpiGenerator<P> {
    fn drive_sinusoid(
        &mut self,
        amplitude: f64,
        frequency: f64,
        offset: f64,
    ) -> Result<(), InstrumentError> {
        self.terminal.write(&format!(
            "APPLy:SINusoid {},{},{}",
            frequency, amplitude, offset
        ))?;

        if !self.output_enabled {
            self.terminal.write("OUTPut ON")?;
            self.output_enabled = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPort;

    #[test]
    fn test_output_enabled_once() {
        let mut generator = ScpiGenerator::new(ScpiTerminal::new(MockPort::default()));
        generator.drive_sinusoid(2.5, 1000.0, 0.0).unwrap();
        generator.drive_sinusoid(2.5, 1258.925, -0.1).unwrap();

        assert_eq!(
            generator.terminal.get_ref().written_lines(),
            vec![
                "APPLy:SINusoid 1000,2.5,0",
                "OUTPut ON",
                "APPLy:SINusoid 1258.925,2.5,-0.1",
            ]
        );
    }
}
