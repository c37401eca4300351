//! Keyboard-simulation encoding.
//!
//! The host drives sales by injecting key codes into the register's input
//! buffer. A textual sequence such as `$CLEAR$3*ABC$PLU$` expands into the
//! `#S` command: `$`-escaped tokens map through the key table, every other
//! character maps to its ASCII byte value. Unknown tokens are rejected; the
//! table is deliberately closed.

use crate::constants::key;
use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;

fn token_code(token: &str) -> Option<u8> {
    match token {
        "KEY" => Some(key::KEY),
        "CLEAR" => Some(key::CLEAR),
        "RETURN" => Some(key::RETURN),
        "000" => Some(key::TRIPLE_ZERO),
        "00" => Some(key::DOUBLE_ZERO),
        "PLU" => Some(key::PLU),
        "SHIFT" => Some(key::SHIFT),
        "SUBTOTAL" => Some(key::SUBTOTAL),
        "TOTAL" => Some(key::TOTAL),
        "KEYBOARD" => Some(key::KEYBOARD),
        _ => None,
    }
}

/// Expands a keyboard sequence into key codes.
pub fn encode_key_sequence(sequence: &str) -> Result<Vec<u8>> {
    let mut codes = Vec::new();
    let mut rest = sequence;
    while let Some(at) = rest.find('$') {
        for c in rest[..at].chars() {
            codes.push(char_code(c)?);
        }
        let after = &rest[at + 1..];
        let end = after.find('$').ok_or_else(|| {
            Smart3Error::InvalidArgument(format!(
                "unterminated key token in sequence {sequence:?}"
            ))
        })?;
        let token = &after[..end];
        codes.push(token_code(token).ok_or_else(|| {
            Smart3Error::InvalidArgument(format!("unknown key token ${token}$"))
        })?);
        rest = &after[end + 1..];
    }
    for c in rest.chars() {
        codes.push(char_code(c)?);
    }
    Ok(codes)
}

/// Builds the `#S` keyboard-simulation command for a sequence, optionally
/// asking the register for a hello once the keys have been consumed.
pub fn keyboard_command(sequence: &str, request_hello: bool) -> Result<MessageData> {
    let codes = encode_key_sequence(sequence)?;
    let mut command = String::from("0;#S");
    for (i, code) in codes.iter().enumerate() {
        if i > 0 {
            command.push(':');
        }
        command.push_str(&code.to_string());
    }
    if request_hello {
        command.push_str(";#A");
    }
    MessageData::new(command)
}

fn char_code(c: char) -> Result<u8> {
    if c.is_ascii_graphic() || c == ' ' {
        Ok(c as u8)
    } else {
        Err(Smart3Error::InvalidArgument(format!(
            "character {c:?} has no key code"
        )))
    }
}
