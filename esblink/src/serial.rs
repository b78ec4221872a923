use crate::{control::ControlReceiver, link::Link};
use alloc::boxed::Box;
use embedded_hal::blocking::delay::DelayMs;
use serialport::ClearBuffer;
use std::{
    io::{self, Read, Write},
    time::Duration,
};

/// How long a read blocks before giving the caller a chance to do other work
const READ_TIMEOUT: Duration = Duration::from_millis(10);
const READ_CHUNK_LEN: usize = 64;

/// Host side link over a serial device
pub struct SerialLink(Box<dyn serialport::SerialPort>);

/// Receiving half of a [`SerialLink`](self::SerialLink)
pub struct SerialReader(Box<dyn serialport::SerialPort>);

impl SerialLink {
    pub fn open(path: impl AsRef<str>, baud_rate: u32) -> io::Result<Self> {
        let raw_port = serialport::new(path.as_ref(), baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;

        Self::new_raw(raw_port)
    }

    pub fn new_raw(raw_port: Box<dyn serialport::SerialPort>) -> io::Result<Self> {
        raw_port.clear(ClearBuffer::Input)?;
        Ok(Self(raw_port))
    }

    pub fn reader(&self) -> io::Result<SerialReader> {
        Ok(SerialReader(self.0.try_clone()?))
    }
}

impl Link for SerialLink {
    type Error = io::Error;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.write_all(bytes)?;
        self.0.flush()
    }
}

impl SerialReader {
    /// Feeds whatever arrived into `receiver`, returning the number of bytes read
    ///
    /// Returns `Ok(0)` when nothing arrived within the read timeout.
    pub fn pump(&mut self, receiver: &mut ControlReceiver<'_>) -> io::Result<usize> {
        let mut buffer = [0u8; READ_CHUNK_LEN];

        match self.0.read(&mut buffer) {
            Ok(count) => {
                receiver.on_bytes(&buffer[..count]);
                Ok(count)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Blocking delay backed by the OS scheduler
#[derive(Default, Clone, Copy)]
pub struct StdDelay;

impl DelayMs<u32> for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}
