//! Request/acknowledgement transceiver.
//!
//! Sits on the framed port and adds the acknowledgement-level behaviour:
//! mirroring the last received sequence and cash register number into
//! replies, the hello/ACK/NAK indicator primitives, RS-485 enquiry polling
//! while waiting for inbound data, and the broadcast announcement latch.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::{PhysicalLayer, Smart3Config};
use crate::constants::{ACK, BROADCAST_ADDRESS, DC1, DLE, ENQ, NAK};
use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;
use crate::smart3::packet::{BroadcastPacket, IndicatorPacket, MessagePacket, Packet};
use crate::smart3::serial::{SerialLink, Smart3Port};

/// How long one enquiry waits for the register to start talking.
const ENQ_POLL_WINDOW: Duration = Duration::from_millis(20);

/// Framed-read override applied after an enquiry found data.
const RS485_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Acknowledgement-level wrapper around the framed port.
pub struct Transceiver<L: SerialLink> {
    port: Smart3Port<L>,
    phy: PhysicalLayer,
    /// Paired register address on RS-485.
    unit_address: Option<u8>,
    last_sequence: u8,
    last_crn: u8,
    broadcast_announced: bool,
}

impl<L: SerialLink> Transceiver<L> {
    pub fn new(port: Smart3Port<L>, config: &Smart3Config) -> Result<Self> {
        let unit_address = match config.physical_layer {
            PhysicalLayer::Rs232 => None,
            PhysicalLayer::Rs485 => Some(config.unit_address()?),
        };
        Ok(Transceiver {
            port,
            phy: config.physical_layer,
            unit_address,
            last_sequence: 0,
            last_crn: config.crn,
            broadcast_announced: false,
        })
    }

    pub fn port(&self) -> &Smart3Port<L> {
        &self.port
    }

    /// Sequence number of the most recently received message.
    pub fn last_sequence(&self) -> u8 {
        self.last_sequence
    }

    /// Receives one message packet. On RS-485 the register only speaks when
    /// enquired, so while the input buffer stays empty an ENQ is sent and
    /// the buffer polled for up to 20 ms, repeating until the receive
    /// timeout elapses.
    pub async fn receive_message(&mut self) -> Result<MessagePacket> {
        let packet = match self.phy {
            PhysicalLayer::Rs232 => self.port.receive().await?,
            PhysicalLayer::Rs485 => {
                self.poll_until_input().await?;
                self.port.receive_within(RS485_READ_TIMEOUT).await?
            }
        };
        match packet {
            Packet::Message(message) => {
                self.last_sequence = message.sequence;
                self.last_crn = message.crn;
                self.broadcast_announced = false;
                Ok(message)
            }
            Packet::Indicator(ind) => Err(Smart3Error::Protocol(format!(
                "expected a message packet, received indicator 0x{:02X}",
                ind.control
            ))),
            Packet::Broadcast(_) => Err(Smart3Error::Protocol(
                "expected a message packet, received a broadcast".into(),
            )),
        }
    }

    /// Receives one indicator packet.
    pub async fn receive_indicator(&mut self) -> Result<IndicatorPacket> {
        match self.port.receive().await? {
            Packet::Indicator(ind) => Ok(ind),
            Packet::Message(message) => Err(Smart3Error::Protocol(format!(
                "expected an indicator, received message {:?}",
                message.data.message_type().unwrap_or("?")
            ))),
            Packet::Broadcast(_) => Err(Smart3Error::Protocol(
                "expected an indicator, received a broadcast".into(),
            )),
        }
    }

    /// Sends a message mirroring the last received sequence and CRN.
    pub async fn send_message(&mut self, data: MessageData) -> Result<()> {
        let packet = Packet::Message(MessagePacket {
            address: self.unit_address,
            sequence: self.last_sequence,
            crn: self.last_crn,
            data,
        });
        self.port.send(&packet).await
    }

    /// Requests a status hello: DLE for the next scheduled slot, DC1 for an
    /// immediate one.
    pub async fn send_hello_request(&mut self, immediate: bool) -> Result<()> {
        let control = if immediate { DC1 } else { DLE };
        self.send_indicator(control).await
    }

    pub async fn send_ack(&mut self) -> Result<()> {
        self.send_indicator(ACK).await
    }

    pub async fn send_nak(&mut self) -> Result<()> {
        self.send_indicator(NAK).await
    }

    /// Transmits a broadcast frame. On RS-485 the first broadcast since the
    /// last received message is preceded by an ENQ announcement to the
    /// universal address.
    pub async fn broadcast_sequence(&mut self, payload: &[u8]) -> Result<()> {
        if self.phy == PhysicalLayer::Rs485 && !self.broadcast_announced {
            self.port
                .send(&Packet::indicator(ENQ, Some(BROADCAST_ADDRESS)))
                .await?;
            self.broadcast_announced = true;
        }
        self.port
            .send(&Packet::Broadcast(BroadcastPacket {
                payload: payload.to_vec(),
            }))
            .await
    }

    async fn send_indicator(&mut self, control: u8) -> Result<()> {
        self.port
            .send(&Packet::indicator(control, self.unit_address))
            .await
    }

    /// Enquires the paired register until its reply starts arriving or the
    /// receive timeout elapses.
    async fn poll_until_input(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.port.receive_timeout();
        loop {
            if !self.port.is_in_buffer_empty()? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Smart3Error::Timeout {
                    expected: None,
                    received: 0,
                    discarded: 0,
                });
            }
            self.port
                .send(&Packet::indicator(ENQ, self.unit_address))
                .await?;
            let window = Instant::now() + ENQ_POLL_WINDOW;
            while Instant::now() < window && self.port.is_in_buffer_empty()? {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }
}
