//! Inbound packet framing.
//!
//! The framer consumes the receive stream one byte at a time and emits
//! either an indicator packet or a fully validated message packet. It never
//! fails mid-frame: the first validation error is recorded and raised only
//! once the frame terminator has been consumed, so the receiver stays
//! aligned with the next frame boundary. RS-485 differs from RS-232 in two
//! places: indicator frames carry the unit address twice after the control
//! byte, and message frames carry the address between the preamble and the
//! length byte, where it contributes to parity.

use crate::config::PhysicalLayer;
use crate::constants::{
    is_control_byte, is_indicator_preamble, is_rs485_unit_address, EOT, ETX, LENGTH_BIAS,
    MAX_FRAME_LENGTH, MESSAGE_OVERHEAD_RS232, MESSAGE_OVERHEAD_RS485, MIN_FRAME_LENGTH,
    SEQUENCE_BIAS, STX,
};
use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;
use crate::smart3::packet::{IndicatorPacket, MessagePacket, Packet};

/// States of the inbound framing machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    ReadPreamble,
    /// RS-485 only: first address byte of an indicator frame.
    ReadIndicatorAddress,
    /// RS-485 only: the address byte repeated.
    ReadIndicatorEcho,
    /// RS-485 only: address byte of a message frame.
    ReadAddress,
    ReadLength,
    ReadSequence,
    ReadCrNumber,
    ReadMessage,
    ReadParity,
    TerminateReady,
    TerminateWait,
    Terminated,
}

/// Byte-by-byte packet framer for one physical layer.
#[derive(Debug)]
pub struct PacketFramer {
    phy: PhysicalLayer,
    state: FramerState,
    parity: u8,
    /// Total frame byte count decoded from the length byte.
    frame_length: usize,
    payload_capacity: usize,
    payload: Vec<u8>,
    sequence: u8,
    crn: u8,
    address: Option<u8>,
    indicator_control: u8,
    pending_error: Option<String>,
    bytes_received: usize,
    bytes_discarded: usize,
    packet: Option<Packet>,
}

impl PacketFramer {
    pub fn new(phy: PhysicalLayer) -> Self {
        PacketFramer {
            phy,
            state: FramerState::ReadPreamble,
            parity: 0,
            frame_length: 0,
            payload_capacity: 0,
            payload: Vec::new(),
            sequence: 0,
            crn: 0,
            address: None,
            indicator_control: 0,
            pending_error: None,
            bytes_received: 0,
            bytes_discarded: 0,
            packet: None,
        }
    }

    /// Best-effort hint of the total frame size, known once the length byte
    /// has been read (three bytes for an RS-485 indicator).
    pub fn bytes_expected(&self) -> Option<usize> {
        match self.state {
            FramerState::ReadIndicatorAddress | FramerState::ReadIndicatorEcho => Some(3),
            _ if self.frame_length > 0 => Some(self.frame_length),
            _ => None,
        }
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }

    /// The completed packet, if one has been emitted.
    pub fn current_packet(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    /// Prepares the framer for the next frame.
    pub fn reset(&mut self) {
        *self = PacketFramer::new(self.phy);
    }

    fn message_overhead(&self) -> usize {
        match self.phy {
            PhysicalLayer::Rs232 => MESSAGE_OVERHEAD_RS232,
            PhysicalLayer::Rs485 => MESSAGE_OVERHEAD_RS485,
        }
    }

    fn record_error(&mut self, reason: String) {
        if self.pending_error.is_none() {
            self.pending_error = Some(reason);
        }
        self.state = FramerState::TerminateWait;
    }

    fn emit(&mut self, packet: Packet) -> Result<Option<Packet>> {
        self.state = FramerState::Terminated;
        self.packet = Some(packet.clone());
        Ok(Some(packet))
    }

    /// Feeds one byte to the state machine. Returns a completed packet,
    /// nothing when the frame is still in progress, or the buffered
    /// validation error once the frame boundary has been reached.
    pub fn push(&mut self, byte: u8) -> Result<Option<Packet>> {
        match self.state {
            FramerState::ReadPreamble => {
                if is_indicator_preamble(byte) {
                    self.bytes_received += 1;
                    self.indicator_control = byte;
                    match self.phy {
                        PhysicalLayer::Rs232 => {
                            return self.emit(Packet::Indicator(IndicatorPacket {
                                control: byte,
                                address: None,
                            }));
                        }
                        PhysicalLayer::Rs485 => {
                            self.state = FramerState::ReadIndicatorAddress;
                        }
                    }
                } else if byte == EOT {
                    self.bytes_received += 1;
                    self.parity = EOT;
                    self.state = match self.phy {
                        PhysicalLayer::Rs232 => FramerState::ReadLength,
                        PhysicalLayer::Rs485 => FramerState::ReadAddress,
                    };
                } else {
                    self.bytes_discarded += 1;
                }
                Ok(None)
            }
            FramerState::ReadIndicatorAddress => {
                self.bytes_received += 1;
                if is_rs485_unit_address(byte) {
                    self.address = Some(byte);
                } else {
                    self.pending_error = Some(format!(
                        "indicator address byte 0x{byte:02X} outside 0xA0..=0xAF"
                    ));
                }
                self.state = FramerState::ReadIndicatorEcho;
                Ok(None)
            }
            FramerState::ReadIndicatorEcho => {
                // Consume the echo byte even on error to stay aligned.
                self.bytes_received += 1;
                self.state = FramerState::Terminated;
                if let Some(reason) = self.pending_error.take() {
                    return Err(Smart3Error::PacketValidation(reason));
                }
                if self.address != Some(byte) {
                    return Err(Smart3Error::PacketValidation(format!(
                        "indicator address echo 0x{byte:02X} does not repeat 0x{:02X}",
                        self.address.unwrap_or(0)
                    )));
                }
                self.emit(Packet::Indicator(IndicatorPacket {
                    control: self.indicator_control,
                    address: self.address,
                }))
            }
            FramerState::ReadAddress => {
                self.bytes_received += 1;
                self.parity ^= byte;
                if is_rs485_unit_address(byte) {
                    self.address = Some(byte);
                    self.state = FramerState::ReadLength;
                } else {
                    self.record_error(format!(
                        "message address byte 0x{byte:02X} outside 0xA0..=0xAF"
                    ));
                }
                Ok(None)
            }
            FramerState::ReadLength => {
                self.bytes_received += 1;
                self.parity ^= byte;
                let length = byte.wrapping_sub(LENGTH_BIAS) as usize;
                if byte < LENGTH_BIAS
                    || !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&length)
                    || length < self.message_overhead()
                {
                    self.record_error(format!(
                        "length byte 0x{byte:02X} decodes to {length}, outside {MIN_FRAME_LENGTH}..={MAX_FRAME_LENGTH}"
                    ));
                } else {
                    self.frame_length = length;
                    self.payload_capacity = length - self.message_overhead();
                    self.payload = Vec::with_capacity(self.payload_capacity);
                    self.state = FramerState::ReadSequence;
                }
                Ok(None)
            }
            FramerState::ReadSequence => {
                self.bytes_received += 1;
                self.parity ^= byte;
                if (0x20..=0x7F).contains(&byte) {
                    self.sequence = byte - SEQUENCE_BIAS;
                    self.state = FramerState::ReadCrNumber;
                } else {
                    self.record_error(format!(
                        "sequence byte 0x{byte:02X} outside 0x20..=0x7F"
                    ));
                }
                Ok(None)
            }
            FramerState::ReadCrNumber => {
                self.bytes_received += 1;
                self.parity ^= byte;
                if (0x20..=0x83).contains(&byte) {
                    self.crn = byte - SEQUENCE_BIAS;
                    self.state = FramerState::ReadMessage;
                } else {
                    self.record_error(format!(
                        "cash register number byte 0x{byte:02X} outside 0x20..=0x83"
                    ));
                }
                Ok(None)
            }
            FramerState::ReadMessage => {
                self.bytes_received += 1;
                if self.payload.len() < self.payload_capacity {
                    if is_control_byte(byte) {
                        self.record_error(format!(
                            "control byte 0x{byte:02X} inside payload at offset {}",
                            self.payload.len()
                        ));
                    } else {
                        self.parity ^= byte;
                        self.payload.push(byte);
                    }
                } else if byte == STX {
                    self.parity ^= byte;
                    self.state = FramerState::ReadParity;
                } else {
                    self.record_error(format!(
                        "postamble byte 0x{byte:02X}, expected STX"
                    ));
                }
                Ok(None)
            }
            FramerState::ReadParity => {
                self.bytes_received += 1;
                let expected = (self.parity & 0x7F) + LENGTH_BIAS;
                if byte == expected {
                    self.state = FramerState::TerminateReady;
                } else {
                    self.record_error(format!(
                        "parity byte 0x{byte:02X}, expected 0x{expected:02X}"
                    ));
                }
                Ok(None)
            }
            FramerState::TerminateReady => {
                self.bytes_received += 1;
                self.state = FramerState::Terminated;
                if byte != ETX {
                    return Err(Smart3Error::PacketValidation(format!(
                        "terminator byte 0x{byte:02X}, expected ETX"
                    )));
                }
                let data = MessageData::from_bytes(&self.payload)?;
                self.emit(Packet::Message(MessagePacket {
                    address: self.address,
                    sequence: self.sequence,
                    crn: self.crn,
                    data,
                }))
            }
            FramerState::TerminateWait => {
                self.bytes_received += 1;
                if byte == ETX {
                    self.state = FramerState::Terminated;
                    let reason = self
                        .pending_error
                        .take()
                        .unwrap_or_else(|| "invalid frame".to_string());
                    return Err(Smart3Error::PacketValidation(reason));
                }
                Ok(None)
            }
            FramerState::Terminated => {
                self.bytes_discarded += 1;
                Ok(None)
            }
        }
    }
}
