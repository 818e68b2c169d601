//! Byte transports the engine can drive
//!
//! The engine only needs three things from a link: write bytes, ask how many
//! bytes are waiting, and read them. Serial ports and TCP bridges are both
//! supported; the scripted transport in [`super::scripted`] is used by tests
//! and the demo mode.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;

/// Abstraction for the link to the modem (serial port, UART bridge, socket)
pub trait Transport: Read + Write + Send {
    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Discard any input that has not been read yet
    fn clear_input(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
}

/// Serial port wrapper implementing [`Transport`]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Wrap an already configured port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Name of the underlying port, if the driver knows it
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::other)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }
}

/// TCP stream wrapper implementing [`Transport`]
///
/// Useful when the modem UART is exposed through a serial-to-network bridge.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wrap a connected stream
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Connect to a bridge at `addr` (e.g. `"192.168.1.20:4001"`)
    pub fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.stream.set_nonblocking(true)?;
        // peek() reports min(available, buf.len()), which is all we need
        let mut buf = [0u8; 1024];
        let result = self.stream.peek(&mut buf);
        self.stream.set_nonblocking(false)?;

        match result {
            // Peer closed: report a byte so the next read() sees end of stream
            Ok(0) => Ok(1),
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> io::Result<()> {
        // No flush syscall for sockets: drain until the kernel buffer is empty
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1024];
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }
}
