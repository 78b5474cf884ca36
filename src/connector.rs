use serialport::{SerialPortInfo, SerialPortType};

use crate::serial_terminal::{ScpiTerminal, ScpiTerminalError, DEFAULT_BAUD_RATE};

/// A serial port that looks like one of the bench instruments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDevice {
    pub name: String,
    pub port: String,
}

impl InstrumentDevice {
    pub fn new(name: String, port: String) -> Self {
        Self { name, port }
    }
}

/// USB vendor and product id pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Serial terminal error: {0}")]
    SerialTerminal(#[from] ScpiTerminalError),

    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("Port {port} is not the instrument you're looking for")]
    InvalidPort { port: String },

    #[error("No {name} found. Please connect the instrument or specify the port manually")]
    DeviceNotFound { name: String },
}

/// Finds and opens instrument serial ports by USB id.
#[derive(Debug, Clone)]
pub struct InstrumentConnector {
    name: String,
    usb_ids: Vec<UsbId>,
    baud_rate: u32,
}

impl InstrumentConnector {
    /// USB to RS-232 bridges commonly found on bench instrument cables.
    pub const USB_SERIAL_ADAPTERS: [UsbId; 4] = [
        UsbId::new(0x0403, 0x6001),
        UsbId::new(0x0403, 0x6015),
        UsbId::new(0x067b, 0x2303),
        UsbId::new(0x1a86, 0x7523),
    ];

    pub fn new(name: &str, usb_ids: &[UsbId]) -> Self {
        Self {
            name: name.to_string(),
            usb_ids: usb_ids.to_vec(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    /// Connector accepting any of the [`Self::USB_SERIAL_ADAPTERS`].
    pub fn serial_adapter(name: &str) -> Self {
        Self::new(name, &Self::USB_SERIAL_ADAPTERS)
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Open `port`, or the first matching device when no port is given.
    pub fn connect(&self, port: Option<&str>) -> Result<ScpiTerminal, ConnectorError> {
        let port = match port {
            Some(port) => {
                self.validate_port(port)?;
                port.to_string()
            }
            None => self.first_device_port()?,
        };

        log::debug!("Connecting to {} on port {}", self.name, port);
        let mut terminal: ScpiTerminal = ScpiTerminal::open(&port, self.baud_rate)?;
        let identity = terminal.query("*IDN?")?;
        log::info!("Connected to {} on {}: {}", self.name, port, identity);

        Ok(terminal)
    }

    fn validate_port(&self, port: &str) -> Result<(), ConnectorError> {
        let ports = serialport::available_ports()?;

        if !ports.iter().any(|p| p.port_name == port) {
            return Err(ConnectorError::InvalidPort {
                port: port.to_string(),
            });
        }

        Ok(())
    }

    fn first_device_port(&self) -> Result<String, ConnectorError> {
        log::debug!("Searching for {}", self.name);

        self.get_available_devices()?
            .into_iter()
            .next()
            .map(|device| device.port)
            .ok_or_else(|| ConnectorError::DeviceNotFound {
                name: self.name.clone(),
            })
    }

    fn matches(&self, info: &SerialPortInfo) -> bool {
        match &info.port_type {
            SerialPortType::UsbPort(usb) => self
                .usb_ids
                .contains(&UsbId::new(usb.vid, usb.pid)),
            _ => false,
        }
    }

    /// All serial ports with one of the connector's USB ids.
    pub fn get_available_devices(&self) -> Result<Vec<InstrumentDevice>, ConnectorError> {
        let devices = serialport::available_ports()?
            .into_iter()
            .filter(|info| self.matches(info))
            .map(|info| {
                let name = match &info.port_type {
                    SerialPortType::UsbPort(usb) => {
                        usb.product.clone().unwrap_or_else(|| self.name.clone())
                    }
                    _ => self.name.clone(),
                };
                InstrumentDevice::new(name, info.port_name)
            })
            .collect();

        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_available_devices() {
        // Depends on what is plugged in; only the shape of the result is checked
        let connector = InstrumentConnector::serial_adapter("oscilloscope");
        let result = connector.get_available_devices();
        assert!(
            matches!(result, Ok(_) | Err(ConnectorError::SerialPort(_))),
            "{result:?}"
        );
        for device in result.unwrap_or_default() {
            assert!(!device.name.is_empty());
            assert!(!device.port.is_empty());
        }
    }

    #[test]
    fn test_unknown_port_is_rejected() {
        let connector = InstrumentConnector::serial_adapter("oscilloscope");
        let result = connector.connect(Some("/dev/does-not-exist")).map(|_| ());
        assert!(
            matches!(
                &result,
                Err(ConnectorError::InvalidPort { port }) if port == "/dev/does-not-exist"
            ) || matches!(result, Err(ConnectorError::SerialPort(_))),
            "{result:?}"
        );
    }

    #[test]
    fn test_non_usb_ports_do_not_match() {
        let connector = InstrumentConnector::serial_adapter("generator");
        let info = SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        };
        assert!(!connector.matches(&info));
    }
}
