//! Packet model and outbound frame encoding.
//!
//! Three transport units exist on the wire: single-control-byte indicator
//! packets (three bytes on RS-485, where the address is sent twice),
//! sequence-numbered message packets, and unaddressed broadcast frames used
//! only for bulk PLU loading. Messages checksum by XOR, broadcasts by
//! arithmetic sum; both parities are masked to 7 bits and biased by 0x28.

use crate::config::PhysicalLayer;
use crate::constants::{
    BROADCAST_ADDRESS, EOT, ETX, LENGTH_BIAS, SEQUENCE_BIAS, SEQUENCE_MODULUS, STX,
};
use crate::payload::message::MessageData;

/// A one-control-byte packet, optionally addressed on RS-485.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorPacket {
    pub control: u8,
    pub address: Option<u8>,
}

/// A framed message carrying a [`MessageData`] payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePacket {
    pub address: Option<u8>,
    /// Raw sequence number; wraps modulo 96 on the wire.
    pub sequence: u8,
    /// Cash register number, 0..=99.
    pub crn: u8,
    pub data: MessageData,
}

/// An unaddressed bulk-load frame with raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPacket {
    pub payload: Vec<u8>,
}

/// The transport unit of the Smart3 protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Indicator(IndicatorPacket),
    Message(MessagePacket),
    Broadcast(BroadcastPacket),
}

impl Packet {
    pub fn indicator(control: u8, address: Option<u8>) -> Self {
        Packet::Indicator(IndicatorPacket { control, address })
    }

    pub fn as_indicator(&self) -> Option<&IndicatorPacket> {
        match self {
            Packet::Indicator(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessagePacket> {
        match self {
            Packet::Message(p) => Some(p),
            _ => None,
        }
    }
}

/// XOR parity over the frame bytes from preamble through postamble, masked
/// to 7 bits and biased.
pub fn xor_parity(bytes: &[u8]) -> u8 {
    (bytes.iter().fold(0u8, |acc, b| acc ^ b) & 0x7F) + LENGTH_BIAS
}

/// Additive parity used by broadcast frames, same masking and bias.
pub fn sum_parity(bytes: &[u8]) -> u8 {
    (bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) & 0x7F) + LENGTH_BIAS
}

/// The biased sequence byte transmitted for a raw sequence number.
pub fn sequence_byte(sequence: u8) -> u8 {
    (sequence % SEQUENCE_MODULUS) + SEQUENCE_BIAS
}

/// The biased cash-register-number byte.
pub fn crn_byte(crn: u8) -> u8 {
    crn + SEQUENCE_BIAS
}

/// Encodes a packet into its wire frame.
pub fn pack_packet(packet: &Packet, phy: PhysicalLayer) -> Vec<u8> {
    match packet {
        Packet::Indicator(ind) => match (phy, ind.address) {
            (PhysicalLayer::Rs232, _) | (_, None) => vec![ind.control],
            (PhysicalLayer::Rs485, Some(address)) => vec![ind.control, address, address],
        },
        Packet::Message(msg) => {
            let payload = msg.data.as_bytes();
            let mut frame = Vec::with_capacity(payload.len() + 8);
            frame.push(EOT);
            if phy == PhysicalLayer::Rs485 {
                if let Some(address) = msg.address {
                    frame.push(address);
                }
            }
            // The length byte counts every frame byte, itself included.
            let total = frame.len() + payload.len() + 6;
            frame.push(total as u8 + LENGTH_BIAS);
            frame.push(sequence_byte(msg.sequence));
            frame.push(crn_byte(msg.crn));
            frame.extend_from_slice(payload);
            frame.push(STX);
            let parity = xor_parity(&frame);
            frame.push(parity);
            frame.push(ETX);
            frame
        }
        Packet::Broadcast(bcast) => {
            let mut frame = Vec::with_capacity(bcast.payload.len() + 7);
            frame.push(EOT);
            if phy == PhysicalLayer::Rs485 {
                frame.push(BROADCAST_ADDRESS);
            }
            let total = frame.len() + bcast.payload.len() + 4;
            frame.push(total as u8 + LENGTH_BIAS);
            frame.extend_from_slice(&bcast.payload);
            frame.push(STX);
            let parity = sum_parity(&frame);
            frame.push(parity);
            frame.push(ETX);
            frame
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ACK, DLE};

    fn message(payload: &str, sequence: u8, crn: u8, address: Option<u8>) -> Packet {
        Packet::Message(MessagePacket {
            address,
            sequence,
            crn,
            data: MessageData::new(payload).unwrap(),
        })
    }

    #[test]
    fn packs_rs232_indicator() {
        let frame = pack_packet(&Packet::indicator(ACK, None), PhysicalLayer::Rs232);
        assert_eq!(frame, vec![ACK]);
    }

    #[test]
    fn packs_rs485_indicator_with_doubled_address() {
        let frame = pack_packet(&Packet::indicator(DLE, Some(0xA3)), PhysicalLayer::Rs485);
        assert_eq!(frame, vec![DLE, 0xA3, 0xA3]);
    }

    #[test]
    fn packs_rs232_message_layout() {
        let frame = pack_packet(&message("0", 5, 1, None), PhysicalLayer::Rs232);
        // EOT len seq crn payload STX parity ETX
        assert_eq!(frame.len(), 8);
        assert_eq!(frame[0], EOT);
        assert_eq!(frame[1], 8 + LENGTH_BIAS);
        assert_eq!(frame[2], 5 + SEQUENCE_BIAS);
        assert_eq!(frame[3], 1 + SEQUENCE_BIAS);
        assert_eq!(frame[4], b'0');
        assert_eq!(frame[5], STX);
        assert_eq!(frame[6], xor_parity(&frame[..6]));
        assert_eq!(frame[7], ETX);
    }

    #[test]
    fn rs485_message_address_contributes_to_parity() {
        let with = pack_packet(&message("0", 0, 0, Some(0xA0)), PhysicalLayer::Rs485);
        let without = pack_packet(&message("0", 0, 0, None), PhysicalLayer::Rs232);
        assert_eq!(with.len(), without.len() + 1);
        assert_eq!(with[1], 0xA0);
        assert_eq!(with[2], 9 + LENGTH_BIAS);
        assert_ne!(with[with.len() - 2], without[without.len() - 2]);
    }

    #[test]
    fn sequence_byte_wraps_modulo_96() {
        for s in 0..=255u8 {
            assert_eq!(sequence_byte(s), (s % 96) + 0x20);
        }
        assert_eq!(sequence_byte(96), 0x20);
        assert_eq!(sequence_byte(95), 0x7F);
    }

    #[test]
    fn broadcast_uses_additive_parity() {
        let packet = Packet::Broadcast(BroadcastPacket {
            payload: vec![0x30, 0x31],
        });
        let frame = pack_packet(&packet, PhysicalLayer::Rs232);
        assert_eq!(frame[0], EOT);
        assert_eq!(frame[1], 7 + LENGTH_BIAS);
        assert_eq!(frame[2..4], [0x30, 0x31]);
        assert_eq!(frame[4], STX);
        assert_eq!(frame[5], sum_parity(&frame[..5]));
        assert_eq!(frame[6], ETX);
    }

    #[test]
    fn rs485_broadcast_carries_universal_address() {
        let packet = Packet::Broadcast(BroadcastPacket {
            payload: vec![0x2A],
        });
        let frame = pack_packet(&packet, PhysicalLayer::Rs485);
        assert_eq!(frame[1], BROADCAST_ADDRESS);
        assert_eq!(frame[2], 7 + LENGTH_BIAS);
    }

    #[test]
    fn parity_equivalence_laws() {
        let bytes = [EOT, 0x35, 0x25, 0x21, b'A', b'0', b'1', STX];
        let xor = bytes.iter().fold(0u8, |a, b| a ^ b);
        assert_eq!(xor_parity(&bytes), (xor & 0x7F) + 0x28);
        let sum = bytes.iter().fold(0u8, |a, b| a.wrapping_add(*b));
        assert_eq!(sum_parity(&bytes), (sum & 0x7F) + 0x28);
    }
}
