//! Smart3 Protocol Constants
//!
//! This module defines the wire-level constants of the Smart3 cash-register
//! protocol: control bytes, RS-485 addressing, frame biases and limits, and
//! the keyboard-simulation key codes.

/// Start of text, the message postamble.
pub const STX: u8 = 0x02;

/// End of text, the frame terminator.
pub const ETX: u8 = 0x03;

/// End of transmission, the frame preamble.
pub const EOT: u8 = 0x04;

/// Enquiry, used for RS-485 polling and broadcast announcement.
pub const ENQ: u8 = 0x05;

/// Positive acknowledgement.
pub const ACK: u8 = 0x06;

/// Bell, signalled by the register while out of paper.
pub const BEL: u8 = 0x07;

/// Data link escape, the normal hello request.
pub const DLE: u8 = 0x10;

/// Device control 1, the immediate hello request.
pub const DC1: u8 = 0x11;

/// Negative acknowledgement, requests a retransmission.
pub const NAK: u8 = 0x15;

/// Synchronous idle, signalled by the register while busy.
pub const SYN: u8 = 0x16;

/// Cancel, the register refuses to carry out a request.
pub const CAN: u8 = 0x18;

/// Every byte value with protocol meaning. Payload bytes must never equal
/// any of these.
pub const CONTROL_BYTES: &[u8] = &[STX, ETX, EOT, ENQ, ACK, BEL, DLE, DC1, NAK, SYN, CAN];

/// Control bytes that open an indicator packet.
pub const INDICATOR_PREAMBLES: &[u8] = &[ENQ, ACK, BEL, DLE, DC1, NAK, SYN, CAN];

/// Returns true when the byte has protocol meaning and is therefore banned
/// from message payloads.
pub fn is_control_byte(byte: u8) -> bool {
    CONTROL_BYTES.contains(&byte)
}

/// Returns true when the byte opens an indicator packet.
pub fn is_indicator_preamble(byte: u8) -> bool {
    INDICATOR_PREAMBLES.contains(&byte)
}

/// Bias added to the frame length byte on the wire.
pub const LENGTH_BIAS: u8 = 0x28;

/// Bias added to the sequence and cash-register-number bytes on the wire.
pub const SEQUENCE_BIAS: u8 = 0x20;

/// The raw sequence number wraps modulo this value before biasing.
pub const SEQUENCE_MODULUS: u8 = 96;

/// Highest valid cash register number.
pub const MAX_CRN: u8 = 99;

/// Smallest total frame byte count a length byte may decode to.
pub const MIN_FRAME_LENGTH: usize = 7;

/// Largest total frame byte count a length byte may decode to.
pub const MAX_FRAME_LENGTH: usize = 215;

/// Maximum message payload length in bytes.
pub const MAX_PAYLOAD_LENGTH: usize = 200;

/// Message frame overhead on RS-232: EOT, length, sequence, CRN, STX,
/// parity, ETX.
pub const MESSAGE_OVERHEAD_RS232: usize = 7;

/// Message frame overhead on RS-485 adds the address byte.
pub const MESSAGE_OVERHEAD_RS485: usize = 8;

/// Broadcast frame overhead on RS-232: EOT, length, STX, parity, ETX.
pub const BROADCAST_OVERHEAD_RS232: usize = 5;

/// Broadcast frame overhead on RS-485 adds the universal address byte.
pub const BROADCAST_OVERHEAD_RS485: usize = 6;

/// First RS-485 cash-register unit address (unit number 1).
pub const RS485_ADDRESS_FIRST: u8 = 0xA0;

/// Last RS-485 cash-register unit address (unit number 16).
pub const RS485_ADDRESS_LAST: u8 = 0xAF;

/// Universal RS-485 address used for broadcasts.
pub const BROADCAST_ADDRESS: u8 = 0xC0;

/// Returns true for a valid RS-485 cash-register unit address.
pub fn is_rs485_unit_address(byte: u8) -> bool {
    (RS485_ADDRESS_FIRST..=RS485_ADDRESS_LAST).contains(&byte)
}

/// Size of one fixed broadcast PLU record.
pub const PLU_BROADCAST_RECORD_LEN: usize = 61;

/// Number of broadcast PLU records per confirmation block.
pub const PLU_BROADCAST_BLOCK: usize = 100;

/// Single-byte broadcast asking the register to confirm the block (`?`).
pub const PLU_BROADCAST_CONFIRM: u8 = 0x3F;

/// Single-byte broadcast terminating the bulk load (`*`).
pub const PLU_BROADCAST_TERMINATOR: u8 = 0x2A;

/// Keyboard-simulation key codes. Only the documented short table is
/// authoritative; plain characters encode as their ASCII byte value.
pub mod key {
    pub const KEY: u8 = 1;
    pub const CLEAR: u8 = 3;
    pub const RETURN: u8 = 27;
    pub const TRIPLE_ZERO: u8 = 46;
    pub const DOUBLE_ZERO: u8 = 47;
    pub const PLU: u8 = 62;
    pub const SHIFT: u8 = 95;
    pub const SUBTOTAL: u8 = 101;
    pub const TOTAL: u8 = 102;
    pub const KEYBOARD: u8 = 109;
}
