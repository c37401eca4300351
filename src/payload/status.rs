//! Cash-register status parsing.
//!
//! The register reports its state in the periodic `A01` hello message:
//! three decimal-rendered status bytes (four in the extended variant), a
//! DDMMYYHHMM timestamp, the device name and the serial number.

use serde::Serialize;

use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;

/// Operating mode of the register, bits 0-2 of the first status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperatingMode {
    Inactive,
    Registering,
    Reading,
    Closing,
    Programming,
}

impl OperatingMode {
    fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(OperatingMode::Inactive),
            1 => Ok(OperatingMode::Registering),
            2 => Ok(OperatingMode::Reading),
            3 => Ok(OperatingMode::Closing),
            4 => Ok(OperatingMode::Programming),
            other => Err(Smart3Error::Protocol(format!(
                "unknown operating mode {other}"
            ))),
        }
    }
}

/// Decoded status flag set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    // byte 1
    pub ticket_open: bool,
    pub non_fiscal_ticket_open: bool,
    pub key_striking_started: bool,
    pub reconnection: bool,
    pub keyboard_locked_by_host: bool,
    // byte 2
    pub retransmission_limit_attained: bool,
    pub sequence_error: bool,
    pub syntax_error: bool,
    pub timeout_error: bool,
    pub command_unknown: bool,
    pub command_invalid: bool,
    pub operating_error: bool,
    pub fiscalized: bool,
    // byte 3
    pub hardware_fault: bool,
    pub memory_reset: bool,
    pub fiscal_memory_error: bool,
    pub fiscal_memory_full: bool,
    pub fiscal_closing_threshold_attained: bool,
    pub euro_fiscalized: bool,
    // byte 4, extended variant only
    pub remote_mode: bool,
    pub generic_printer_error: bool,
    pub generic_error: bool,
}

/// Register clock reading, DDMMYYHHMM on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusTimestamp {
    pub day: u8,
    pub month: u8,
    pub year: u8,
    pub hour: u8,
    pub minute: u8,
}

impl StatusTimestamp {
    fn parse(raw: &str) -> Result<Self> {
        if raw.len() != 10 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Smart3Error::Protocol(format!(
                "malformed timestamp {raw:?}, expected DDMMYYHHMM"
            )));
        }
        let digit_pair = |at: usize| raw[at..at + 2].parse::<u8>().unwrap();
        Ok(StatusTimestamp {
            day: digit_pair(0),
            month: digit_pair(2),
            year: digit_pair(4),
            hour: digit_pair(6),
            minute: digit_pair(8),
        })
    }
}

/// Parsed `A01` status block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashRegisterStatus {
    pub mode: OperatingMode,
    pub flags: StatusFlags,
    pub timestamp: StatusTimestamp,
    pub device_name: String,
    pub serial_number: String,
}

impl CashRegisterStatus {
    /// Parses an `A01` payload. The extended variant carries a fourth
    /// status byte before the timestamp.
    pub fn parse(msg: &MessageData) -> Result<Self> {
        let byte1 = status_byte(msg, 1)?;
        let byte2 = status_byte(msg, 2)?;
        let byte3 = status_byte(msg, 3)?;
        // Fields: tag, 3 status bytes, timestamp, name, serial, and a
        // trailing empty field from the closing separator. One more in the
        // extended variant.
        let extended = msg.field_count() >= 9;
        let (byte4, tail) = if extended {
            (status_byte(msg, 4)?, 5)
        } else {
            (0, 4)
        };

        let mode = OperatingMode::from_bits(byte1 & 0x07)?;
        let flags = StatusFlags {
            ticket_open: byte1 & 0x08 != 0,
            non_fiscal_ticket_open: byte1 & 0x10 != 0,
            key_striking_started: byte1 & 0x20 != 0,
            reconnection: byte1 & 0x40 != 0,
            keyboard_locked_by_host: byte1 & 0x80 != 0,
            retransmission_limit_attained: byte2 & 0x01 != 0,
            sequence_error: byte2 & 0x02 != 0,
            syntax_error: byte2 & 0x04 != 0,
            timeout_error: byte2 & 0x08 != 0,
            command_unknown: byte2 & 0x10 != 0,
            command_invalid: byte2 & 0x20 != 0,
            operating_error: byte2 & 0x40 != 0,
            fiscalized: byte2 & 0x80 != 0,
            hardware_fault: byte3 & 0x01 != 0,
            memory_reset: byte3 & 0x02 != 0,
            fiscal_memory_error: byte3 & 0x04 != 0,
            fiscal_memory_full: byte3 & 0x08 != 0,
            fiscal_closing_threshold_attained: byte3 & 0x10 != 0,
            euro_fiscalized: byte3 & 0x40 != 0,
            remote_mode: byte4 & 0x01 != 0,
            generic_printer_error: byte4 & 0x02 != 0,
            generic_error: byte4 & 0x04 != 0,
        };

        let timestamp = StatusTimestamp::parse(
            msg.field(tail)
                .ok_or_else(|| Smart3Error::Protocol("A01 is missing the timestamp".into()))?,
        )?;
        let device_name = msg
            .field(tail + 1)
            .ok_or_else(|| Smart3Error::Protocol("A01 is missing the device name".into()))?
            .to_string();
        let serial_number = msg
            .field(tail + 2)
            .ok_or_else(|| Smart3Error::Protocol("A01 is missing the serial number".into()))?
            .to_string();

        Ok(CashRegisterStatus {
            mode,
            flags,
            timestamp,
            device_name,
            serial_number,
        })
    }
}

fn status_byte(msg: &MessageData, index: usize) -> Result<u8> {
    let value = msg.int_field(index)?;
    u8::try_from(value).map_err(|_| {
        Smart3Error::Protocol(format!("status byte {index} out of range: {value}"))
    })
}
