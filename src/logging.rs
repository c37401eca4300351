//! Logger initialization and wire-transcript helpers.
//!
//! Frames transmitted to the register are logged at trace level prefixed
//! `> `, frames received from it prefixed `< `, both rendered as compact
//! hex. The transcript is best-effort and never affects protocol flow.

use log::{debug, error, info, log_enabled, trace, warn, Level};

use crate::util::hex::format_hex_compact;

/// Initializes the logger with the `env_logger` crate.
pub fn init_logger() {
    env_logger::init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}

/// Appends a transmitted frame to the wire transcript.
pub fn transcript_tx(frame: &[u8]) {
    if log_enabled!(Level::Trace) {
        trace!("> {}", format_hex_compact(frame));
    }
}

/// Appends a received frame to the wire transcript.
pub fn transcript_rx(frame: &[u8]) {
    if log_enabled!(Level::Trace) {
        trace!("< {}", format_hex_compact(frame));
    }
}
