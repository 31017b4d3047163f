use std::{
    collections::VecDeque,
    io::{ErrorKind, Read},
    time::Duration,
};

use serialport::{DataBits, Parity, StopBits};

pub type ComResult<T> = Result<T, CommunicationError>;

/// A byte-oriented receive channel, such as the UART a GPS module is wired to.
pub trait SerialLink: Read {
    /// Returns how many bytes can currently be read without blocking
    fn bytes_available(&mut self) -> ComResult<usize>;

    /// Reads all currently buffered bytes and throws them away.
    /// ## Returns
    /// The number of bytes that were read
    fn drain(&mut self) -> ComResult<usize> {
        let available = self.bytes_available()?;
        if available == 0 {
            return Ok(0);
        }

        let mut buffer = vec![0; available];
        read_some(self, &mut buffer)
    }

    /// Reads all currently buffered bytes into `lines`.
    /// ## Returns
    /// The number of bytes that were read
    fn read_into(&mut self, lines: &mut LineBuffer) -> ComResult<usize> {
        let available = self.bytes_available()?;
        if available == 0 {
            return Ok(0);
        }

        let mut buffer = vec![0; available];
        let count = read_some(self, &mut buffer)?;
        lines.extend(&buffer[..count]);
        Ok(count)
    }
}

/// A read that times out after `bytes_available` reported data is not fatal, it just yields nothing
fn read_some<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> ComResult<usize> {
    match reader.read(buffer) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e.into()),
    }
}

impl SerialLink for Box<dyn serialport::SerialPort> {
    fn bytes_available(&mut self) -> ComResult<usize> {
        Ok(serialport::SerialPort::bytes_to_read(&**self)? as usize)
    }
}

/// Opens the serial device at `path` with 8N1 framing
pub fn open_port(
    path: &str,
    baudrate: u32,
    timeout: Duration,
) -> ComResult<Box<dyn serialport::SerialPort>> {
    let port = serialport::new(path, baudrate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(timeout)
        .open()?;
    log::info!("Opened {path} at {baudrate} baud");
    Ok(port)
}

/// Splits a raw byte stream into newline terminated text lines.
///
/// Lines are trimmed of surrounding whitespace (including the `\r` of a `\r\n` terminator).
/// Lines that are not valid UTF-8 are dropped, unless the buffer was created with
/// [`LineBuffer::lossy`]. Any partial line exceeding [`LineBuffer::MAX_LINE_LENGTH`] bytes is
/// dropped in both modes.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    lines: VecDeque<String>,
    /// Set while skipping the rest of an overlong line
    overflowed: bool,
    /// Strip invalid sequences instead of dropping the line
    lossy: bool,
    dropped: usize,
}

impl LineBuffer {
    pub const MAX_LINE_LENGTH: usize = 512;

    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer that keeps lines with invalid UTF-8, with the offending bytes removed.
    pub fn lossy() -> Self {
        Self { lossy: true, ..Self::default() }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.finish_line();
            } else if self.overflowed {
                continue;
            } else if self.pending.len() >= Self::MAX_LINE_LENGTH {
                log::debug!("Dropping line longer than {} bytes", Self::MAX_LINE_LENGTH);
                self.pending.clear();
                self.overflowed = true;
                self.dropped += 1;
            } else {
                self.pending.push(byte);
            }
        }
    }

    fn finish_line(&mut self) {
        if std::mem::take(&mut self.overflowed) {
            return;
        }

        let raw = std::mem::take(&mut self.pending);
        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) if self.lossy => {
                String::from_utf8_lossy(e.as_bytes()).replace(char::REPLACEMENT_CHARACTER, "")
            }
            Err(e) => {
                log::debug!("Dropping line that is not valid UTF-8: {e}");
                self.dropped += 1;
                return;
            }
        };

        let line = line.trim();
        if !line.is_empty() {
            self.lines.push_back(line.to_owned());
        }
    }

    /// Pops the oldest complete line
    pub fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    /// Number of lines thrown away because they were undecodable or too long
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    /// The serial device could not be opened or queried
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
    /// Signals that the underlying receiving failed. Not recoverable on its own.
    #[error("io error: {0}")]
    Io(std::io::Error),
    #[error("receive timed out")]
    TimedOut,
}

impl From<std::io::Error> for CommunicationError {
    fn from(value: std::io::Error) -> Self {
        match value.kind() {
            ErrorKind::TimedOut => CommunicationError::TimedOut,
            _ => CommunicationError::Io(value),
        }
    }
}
