//! Message payloads and their field view.
//!
//! A [`MessageData`] is the text carried inside a message packet, at most
//! 200 bytes and free of protocol control bytes. It can be read as a raw
//! character sequence or as an ordered sequence of fields separated by `:`
//! or `;`. Field 0 is the message type, a 3-character tag beginning with
//! `A`, `B` or `C` on every inbound message.

use std::fmt;

use crate::constants::{is_control_byte, MAX_PAYLOAD_LENGTH};
use crate::error::{Result, Smart3Error};

/// An immutable, validated message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageData {
    text: String,
}

impl MessageData {
    /// Builds a payload from host-side text, validating length and the
    /// control-byte exclusion.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.len() > MAX_PAYLOAD_LENGTH {
            return Err(Smart3Error::InvalidArgument(format!(
                "payload length {} exceeds the {MAX_PAYLOAD_LENGTH}-byte maximum",
                text.len()
            )));
        }
        if !text.is_ascii() {
            return Err(Smart3Error::InvalidArgument(
                "payload must be ASCII".into(),
            ));
        }
        if let Some(byte) = text.bytes().find(|b| is_control_byte(*b)) {
            return Err(Smart3Error::InvalidArgument(format!(
                "payload contains control byte 0x{byte:02X}"
            )));
        }
        Ok(MessageData { text })
    }

    /// Builds a payload from wire bytes already screened for control bytes
    /// by the framer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Smart3Error::PacketValidation("payload is not valid ASCII text".into()))?;
        if !text.is_ascii() {
            return Err(Smart3Error::PacketValidation(
                "payload is not valid ASCII text".into(),
            ));
        }
        Ok(MessageData {
            text: text.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Iterates the fields, splitting on both separators.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.text.split(|c| c == ':' || c == ';')
    }

    /// Returns the field at `index` (field 0 is the message type).
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields().nth(index)
    }

    pub fn field_count(&self) -> usize {
        self.fields().count()
    }

    /// The 3-character message-type tag, when field 0 carries one.
    pub fn message_type(&self) -> Option<&str> {
        let tag = self.field(0)?;
        let mut chars = tag.chars();
        match (chars.next(), tag.len()) {
            (Some('A' | 'B' | 'C'), 3) => Some(tag),
            _ => None,
        }
    }

    /// Parses field `index` as an integer, reporting a protocol error with
    /// the field position on failure.
    pub fn int_field(&self, index: usize) -> Result<i64> {
        let raw = self
            .field(index)
            .ok_or_else(|| Smart3Error::Protocol(format!("missing field {index}")))?;
        raw.trim().parse::<i64>().map_err(|_| {
            Smart3Error::Protocol(format!("field {index} is not a number: {raw:?}"))
        })
    }
}

impl fmt::Display for MessageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_view_splits_on_both_separators() {
        let msg = MessageData::new("A01:068:128;192:SMARTIII").unwrap();
        assert_eq!(msg.field(0), Some("A01"));
        assert_eq!(msg.field(1), Some("068"));
        assert_eq!(msg.field(2), Some("128"));
        assert_eq!(msg.field(3), Some("192"));
        assert_eq!(msg.field(4), Some("SMARTIII"));
        assert_eq!(msg.field_count(), 5);
    }

    #[test]
    fn message_type_requires_three_char_tag() {
        assert_eq!(
            MessageData::new("B23:1").unwrap().message_type(),
            Some("B23")
        );
        assert_eq!(MessageData::new("0;+1").unwrap().message_type(), None);
        assert_eq!(MessageData::new("D01:1").unwrap().message_type(), None);
    }

    #[test]
    fn rejects_control_bytes() {
        assert!(MessageData::new("bad\x02payload").is_err());
        assert!(MessageData::new("bad\x15payload").is_err());
    }

    #[test]
    fn rejects_oversized_payload() {
        let text = "x".repeat(MAX_PAYLOAD_LENGTH + 1);
        assert!(MessageData::new(text).is_err());
        assert!(MessageData::new("x".repeat(MAX_PAYLOAD_LENGTH)).is_ok());
    }

    #[test]
    fn int_field_reports_position() {
        let msg = MessageData::new("B99:12:x").unwrap();
        assert_eq!(msg.int_field(1).unwrap(), 12);
        assert!(matches!(
            msg.int_field(2),
            Err(Smart3Error::Protocol(_))
        ));
        assert!(matches!(
            msg.int_field(9),
            Err(Smart3Error::Protocol(_))
        ));
    }
}
