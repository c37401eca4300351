//! Serial port driver with framed receive.
//!
//! [`Smart3Port`] owns the byte stream and the inbound framer. Reads and
//! writes are bounded by the configured timeouts; a framed read that runs
//! out of time fails with a timeout error carrying the framer's progress
//! snapshot. The port is generic over [`SerialLink`] so tests can inject a
//! mock in place of the OS device.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tokio_serial::SerialPortBuilderExt;

use crate::config::{PhysicalLayer, Smart3Config};
use crate::error::{Result, Smart3Error};
use crate::logging;
use crate::smart3::framer::PacketFramer;
use crate::smart3::packet::{pack_packet, Packet};

/// Byte-stream plus buffer-control surface of a serial device.
#[async_trait]
pub trait SerialLink: AsyncRead + AsyncWrite + Unpin + Send {
    /// Number of bytes waiting in the input buffer.
    fn bytes_to_read(&self) -> io::Result<u32>;

    /// Number of bytes not yet transmitted from the output buffer.
    fn bytes_to_write(&self) -> io::Result<u32>;

    /// Drops everything in the input buffer.
    fn discard_in_buffer(&self) -> io::Result<()>;

    /// Drops everything in the output buffer.
    fn discard_out_buffer(&self) -> io::Result<()>;

    async fn flush_link(&mut self) -> io::Result<()>;
}

#[async_trait]
impl SerialLink for tokio_serial::SerialStream {
    fn bytes_to_read(&self) -> io::Result<u32> {
        serialport::SerialPort::bytes_to_read(self).map_err(io::Error::from)
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        serialport::SerialPort::bytes_to_write(self).map_err(io::Error::from)
    }

    fn discard_in_buffer(&self) -> io::Result<()> {
        serialport::SerialPort::clear(self, serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }

    fn discard_out_buffer(&self) -> io::Result<()> {
        serialport::SerialPort::clear(self, serialport::ClearBuffer::Output)
            .map_err(io::Error::from)
    }

    async fn flush_link(&mut self) -> io::Result<()> {
        AsyncWriteExt::flush(self).await
    }
}

/// Opens the OS serial device for the given configuration: 8-N-1, no
/// handshake.
pub fn open_port(config: &Smart3Config) -> Result<tokio_serial::SerialStream> {
    tokio_serial::new(&config.port_name, config.baud_rate.as_u32())
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(config.receive_timeout())
        .open_native_async()
        .map_err(|e| Smart3Error::SerialPort(e.to_string()))
}

/// Serial port driver for one Smart3 link.
pub struct Smart3Port<L: SerialLink> {
    link: L,
    framer: PacketFramer,
    phy: PhysicalLayer,
    receive_timeout: Duration,
    write_timeout: Duration,
}

impl<L: SerialLink> Smart3Port<L> {
    pub fn new(link: L, config: &Smart3Config) -> Self {
        Smart3Port {
            link,
            framer: PacketFramer::new(config.physical_layer),
            phy: config.physical_layer,
            receive_timeout: config.receive_timeout(),
            write_timeout: config.write_timeout(),
        }
    }

    pub fn physical_layer(&self) -> PhysicalLayer {
        self.phy
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    /// Encodes and transmits one packet within the write timeout.
    pub async fn send(&mut self, packet: &Packet) -> Result<()> {
        let frame = pack_packet(packet, self.phy);
        let limit = self.write_timeout;
        let link = &mut self.link;
        let write = async {
            link.write_all(&frame).await?;
            link.flush_link().await
        };
        match timeout(limit, write).await {
            Err(_) => Err(Smart3Error::SerialPort("write timed out".into())),
            Ok(Err(e)) => Err(Smart3Error::SerialPort(e.to_string())),
            Ok(Ok(())) => {
                logging::transcript_tx(&frame);
                Ok(())
            }
        }
    }

    /// Receives one framed packet within the default receive timeout.
    pub async fn receive(&mut self) -> Result<Packet> {
        self.receive_within(self.receive_timeout).await
    }

    /// Receives one framed packet within an overriding timeout, driving the
    /// framer byte by byte.
    pub async fn receive_within(&mut self, limit: Duration) -> Result<Packet> {
        self.framer.reset();
        let deadline = Instant::now() + limit;
        let mut transcript = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout_error());
            }
            let read = match timeout(remaining, self.link.read(&mut byte)).await {
                Err(_) => return Err(self.timeout_error()),
                Ok(Err(e)) => return Err(Smart3Error::SerialPort(e.to_string())),
                Ok(Ok(n)) => n,
            };
            if read == 0 {
                // Nothing buffered; yield briefly rather than spin.
                tokio::time::sleep(Duration::from_millis(1)).await;
                continue;
            }
            transcript.push(byte[0]);
            match self.framer.push(byte[0]) {
                Ok(None) => {}
                Ok(Some(packet)) => {
                    logging::transcript_rx(&transcript);
                    return Ok(packet);
                }
                Err(e) => {
                    logging::transcript_rx(&transcript);
                    return Err(e);
                }
            }
        }
    }

    pub fn is_in_buffer_empty(&self) -> Result<bool> {
        self.link
            .bytes_to_read()
            .map(|n| n == 0)
            .map_err(|e| Smart3Error::SerialPort(e.to_string()))
    }

    pub fn is_out_buffer_empty(&self) -> Result<bool> {
        self.link
            .bytes_to_write()
            .map(|n| n == 0)
            .map_err(|e| Smart3Error::SerialPort(e.to_string()))
    }

    pub fn discard_in_buffer(&self) -> Result<()> {
        self.link
            .discard_in_buffer()
            .map_err(|e| Smart3Error::SerialPort(e.to_string()))
    }

    pub fn discard_out_buffer(&self) -> Result<()> {
        self.link
            .discard_out_buffer()
            .map_err(|e| Smart3Error::SerialPort(e.to_string()))
    }

    fn timeout_error(&self) -> Smart3Error {
        Smart3Error::Timeout {
            expected: self.framer.bytes_expected(),
            received: self.framer.bytes_received(),
            discarded: self.framer.bytes_discarded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ACK;
    use crate::payload::message::MessageData;
    use crate::smart3::packet::MessagePacket;
    use crate::smart3::serial_mock::MockSerialPort;

    fn test_port(mock: MockSerialPort, timeout_ms: u64) -> Smart3Port<MockSerialPort> {
        let config = Smart3Config {
            receive_timeout_ms: timeout_ms,
            write_timeout_ms: timeout_ms,
            ..Smart3Config::default()
        };
        Smart3Port::new(mock, &config)
    }

    #[tokio::test]
    async fn send_writes_the_encoded_frame() {
        let mock = MockSerialPort::new();
        let mut port = test_port(mock.clone(), 1000);
        port.send(&Packet::indicator(ACK, None)).await.unwrap();
        assert_eq!(mock.written(), vec![ACK]);
    }

    #[tokio::test]
    async fn receive_decodes_a_queued_frame() {
        let mock = MockSerialPort::new();
        let message = Packet::Message(MessagePacket {
            address: None,
            sequence: 2,
            crn: 0,
            data: MessageData::new("B23:1").unwrap(),
        });
        mock.queue_bytes(&pack_packet(&message, PhysicalLayer::Rs232));
        let mut port = test_port(mock, 1000);
        let received = port.receive().await.unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn receive_times_out_with_progress_snapshot() {
        let mock = MockSerialPort::new();
        // An unfinished frame: preamble and length only.
        mock.queue_bytes(&[0x04, 0x30]);
        let mut port = test_port(mock, 50);
        match port.receive().await {
            Err(Smart3Error::Timeout {
                expected,
                received,
                discarded,
            }) => {
                assert_eq!(expected, Some(8));
                assert_eq!(received, 2);
                assert_eq!(discarded, 0);
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn buffer_emptiness_tracks_the_mock() {
        let mock = MockSerialPort::new();
        let port = test_port(mock.clone(), 1000);
        assert!(port.is_in_buffer_empty().unwrap());
        mock.queue_bytes(&[ACK]);
        assert!(!port.is_in_buffer_empty().unwrap());
        port.discard_in_buffer().unwrap();
        assert!(port.is_in_buffer_empty().unwrap());
    }
}
