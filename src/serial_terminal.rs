use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum ScpiTerminalError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Timeout error: No complete response to '{command}', received '{received}'")]
    Timeout { command: String, received: String },

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Line-oriented SCPI session over a byte stream.
///
/// Commands are sent newline-terminated; a query's response ends at the first newline.
#[derive(Debug)]
pub struct ScpiTerminal<P = Box<dyn SerialPort>> {
    port: P,
    timeout: Duration,
}

impl ScpiTerminal<Box<dyn SerialPort>> {
    /// Open a serial port and discard whatever is still buffered on it.
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, ScpiTerminalError> {
        log::debug!("Opening {} at {} baud", port, baud_rate);
        let serial = serialport::new(port, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;
        serial.clear(serialport::ClearBuffer::All)?;

        Ok(Self::new(serial))
    }
}

impl<P: Read + Write> ScpiTerminal<P> {
    const TERMINATOR: u8 = b'\n';

    pub fn new(port: P) -> Self {
        Self {
            port,
            timeout: Duration::from_secs(2),
        }
    }

    /// How long a query waits for the end of its response.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }

    /// Send a command that produces no response.
    pub fn write(&mut self, command: &str) -> Result<(), ScpiTerminalError> {
        log::debug!("> {}", command);
        let command_with_newline = format!("{}\n", command);
        self.port.write_all(command_with_newline.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a command and return its single-line response, trimmed.
    pub fn query(&mut self, command: &str) -> Result<String, ScpiTerminalError> {
        self.write(command)?;
        let response = self.read_line(command)?;
        log::debug!("< {}", response);
        Ok(response)
    }

    fn read_line(&mut self, command: &str) -> Result<String, ScpiTerminalError> {
        let mut response = Vec::new();
        let start = Instant::now();

        loop {
            let mut byte = [0u8; 1];
            match self.port.read_exact(&mut byte) {
                Ok(()) => {
                    if byte[0] == Self::TERMINATOR {
                        break;
                    }
                    response.push(byte[0]);
                }
                Err(e) if is_idle(&e) => {
                    if start.elapsed() >= self.timeout {
                        return Err(ScpiTerminalError::Timeout {
                            command: command.to_string(),
                            received: String::from_utf8_lossy(&response).to_string(),
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let response_str = String::from_utf8(response)?;
        Ok(response_str.trim().to_string())
    }
}

/// Errors a serial read reports while the instrument has not answered yet.
fn is_idle(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::UnexpectedEof
    )
}
