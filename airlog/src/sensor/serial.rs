//! Serial transport for the K30 CO2 sensor.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::SerialStream;
use tracing::{info, trace};

use super::{FrameTransport, SensorError};
use crate::config::Co2SensorConfig;

/// Request/response exchange over a byte stream.
///
/// After writing the command the transport waits `settle_delay`, then reads
/// until `expected_len` bytes have arrived or `read_timeout` expires.
pub struct SerialTransport<S> {
    stream: S,
    settle_delay: Duration,
    read_timeout: Duration,
}

impl SerialTransport<SerialStream> {
    /// Open the serial port (8N1).
    pub fn open(config: &Co2SensorConfig) -> Result<Self, SensorError> {
        let builder = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .timeout(config.read_timeout());

        let stream = SerialStream::open(&builder).map_err(|e| SensorError::Open {
            device: config.port.clone(),
            message: e.to_string(),
            hint: "check the device exists and the user is in the 'dialout' group",
        })?;

        info!(
            port = %config.port,
            baud = config.baud_rate,
            "Opened CO2 serial port"
        );

        Ok(Self::new(
            stream,
            config.settle_delay(),
            config.read_timeout(),
        ))
    }
}

impl<S> SerialTransport<S> {
    pub fn new(stream: S, settle_delay: Duration, read_timeout: Duration) -> Self {
        Self {
            stream,
            settle_delay,
            read_timeout,
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> FrameTransport for SerialTransport<S> {
    async fn transact(&mut self, command: &[u8], expected_len: usize) -> std::io::Result<Vec<u8>> {
        self.stream.write_all(command).await?;
        self.stream.flush().await?;

        tokio::time::sleep(self.settle_delay).await;

        let mut buf = vec![0u8; expected_len];
        let mut filled = 0;
        let deadline = Instant::now() + self.read_timeout;

        while filled < expected_len {
            match tokio::time::timeout_at(deadline, self.stream.read(&mut buf[filled..])).await {
                Err(_) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) => return Err(e),
            }
        }

        buf.truncate(filled);
        trace!(bytes = filled, "Serial response");
        Ok(buf)
    }
}
