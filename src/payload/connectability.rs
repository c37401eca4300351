//! Connectability programming parsing.
//!
//! During startup the register transmits its communication programming in a
//! series of `C24` records. Field 3 keys the record: `"0"` carries the
//! timing block, `"1"` the identity and capacity block, and `"*"`
//! terminates the series.

use serde::Serialize;

use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;

/// Communication programming of the register, assembled from C24 records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectabilityProgramming {
    /// Hello intervals in seconds, one per supported baud speed.
    pub hello_interval_seconds: [u32; 3],
    /// ACK timeout; decaseconds on the wire.
    pub timeout_ms: u64,
    pub beep_on_timeout: bool,
    /// Number of retransmissions the register performs before giving up.
    pub retransmissions: u32,
    pub interactivity_level: u8,
    pub history_level: u8,
    pub crn: u8,
    pub page_count: u16,
    pub baud: u32,
    pub plu_capacity: u32,
    pub customer_capacity: u32,
    pub rs485_address: u8,
    /// Communication flag bits; two wire bytes in the extended variant.
    pub communication_flags: u16,
}

impl Default for ConnectabilityProgramming {
    fn default() -> Self {
        ConnectabilityProgramming {
            hello_interval_seconds: [30, 20, 10],
            timeout_ms: 0,
            beep_on_timeout: false,
            retransmissions: 2,
            interactivity_level: 0,
            history_level: 0,
            crn: 0,
            page_count: 0,
            baud: 9600,
            plu_capacity: 0,
            customer_capacity: 0,
            rs485_address: 0,
            communication_flags: 0,
        }
    }
}

impl ConnectabilityProgramming {
    /// Applies one C24 record. Returns true when the terminator record has
    /// been seen and the series is complete.
    pub fn apply_record(&mut self, msg: &MessageData) -> Result<bool> {
        let key = msg
            .field(3)
            .ok_or_else(|| Smart3Error::Protocol("C24 record is missing its key field".into()))?;
        match key {
            "*" => Ok(true),
            "0" => {
                self.hello_interval_seconds = [
                    parse_u32(msg, 4)?,
                    parse_u32(msg, 5)?,
                    parse_u32(msg, 6)?,
                ];
                self.timeout_ms = u64::from(parse_u32(msg, 7)?) * 10_000;
                self.beep_on_timeout = parse_u32(msg, 8)? != 0;
                self.retransmissions = parse_u32(msg, 9)?;
                Ok(false)
            }
            "1" => {
                self.interactivity_level = parse_u8(msg, 4)?;
                self.history_level = parse_u8(msg, 5)?;
                self.crn = parse_u8(msg, 6)?;
                self.page_count = parse_u32(msg, 7)? as u16;
                self.baud = parse_u32(msg, 8)?;
                self.plu_capacity = parse_u32(msg, 9)?;
                self.customer_capacity = parse_u32(msg, 10)?;
                self.rs485_address = parse_u8(msg, 11)?;
                let low = parse_u32(msg, 12)? as u16;
                // The extended variant splits the flags over a second byte.
                let high = match msg.field(13) {
                    Some(raw) if !raw.is_empty() => parse_u32(msg, 13)? as u16,
                    _ => 0,
                };
                self.communication_flags = (high << 8) | (low & 0x00FF);
                Ok(false)
            }
            other => {
                // Unknown record keys are ignored so newer register
                // firmware does not break the startup handshake.
                log::debug!("ignoring C24 record with unknown key {other:?}");
                Ok(false)
            }
        }
    }
}

fn parse_u32(msg: &MessageData, index: usize) -> Result<u32> {
    let value = msg.int_field(index)?;
    u32::try_from(value).map_err(|_| {
        Smart3Error::Protocol(format!("C24 field {index} out of range: {value}"))
    })
}

fn parse_u8(msg: &MessageData, index: usize) -> Result<u8> {
    let value = msg.int_field(index)?;
    u8::try_from(value).map_err(|_| {
        Smart3Error::Protocol(format!("C24 field {index} out of range: {value}"))
    })
}
