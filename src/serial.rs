//! Serial transport for the power bank's UART / USB-CDC port.
//!
//! The device speaks raw 9600 baud, 8 data bits, no parity, two stop bits
//! with no flow control. Virtual serial ports ignore the line settings but
//! accept them.

use crate::error::{PowerbankError, Result};
use crate::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits,
};

/// Default baud rate of the power bank
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default device node of the power bank's USB-CDC port
pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Serial transport over any async byte stream.
///
/// # Example
///
/// ```ignore
/// use powerbank_rs::{Powerbank, ProtocolConfig, SerialTransport};
///
/// let transport = SerialTransport::open("/dev/ttyACM0", 9600)?;
/// let mut bank = Powerbank::new(transport, ProtocolConfig::default());
/// let state = bank.read_state().await?;
/// ```
pub struct SerialTransport<S = SerialStream> {
    port: S,
    path: String,
    /// Flushes the driver's receive queue, when the stream has one
    purge: Option<fn(&S) -> Result<()>>,
}

impl<S> std::fmt::Debug for SerialTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SerialTransport<SerialStream> {
    /// Open and configure a serial port.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0" or "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate (9600 for the power bank)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| PowerbankError::Io(std::io::Error::other(e.to_string())))?;

        // Drop anything the device sent before we were listening.
        clear(&port, ClearBuffer::All)?;

        tracing::debug!("Opened {} at {} baud", path, baud_rate);

        Ok(Self {
            port,
            path: path.to_string(),
            purge: Some(|port| clear(port, ClearBuffer::Input)),
        })
    }
}

fn clear(port: &SerialStream, buffer: ClearBuffer) -> Result<()> {
    tokio_serial::SerialPort::clear(port, buffer)
        .map_err(|e| PowerbankError::Io(std::io::Error::other(e.to_string())))
}

impl<S> SerialTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-configured stream.
    pub fn from_stream(port: S, path: impl Into<String>) -> Self {
        Self {
            port,
            path: path.into(),
            purge: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<S> Transport for SerialTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let written = self.port.write(data).await?;
        self.port.flush().await?;
        Ok(written)
    }

    async fn read(&mut self, buf: &mut [u8], wait: Duration) -> Result<Option<usize>> {
        match tokio::time::timeout(wait, self.port.read(buf)).await {
            Ok(Ok(n)) => Ok(Some(n)),
            Ok(Err(e)) => Err(PowerbankError::Io(e)),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn discard_input(&mut self) -> Result<usize> {
        if let Some(purge) = self.purge {
            purge(&self.port)?;
        }

        // Whatever the stream itself has buffered is read out and dropped.
        let mut scratch = [0u8; 64];
        let mut dropped = 0;
        loop {
            match tokio::time::timeout(Duration::ZERO, self.port.read(&mut scratch)).await {
                Ok(Ok(0)) | Err(_) => return Ok(dropped),
                Ok(Ok(n)) => dropped += n,
                Ok(Err(e)) => return Err(PowerbankError::Io(e)),
            }
        }
    }
}
