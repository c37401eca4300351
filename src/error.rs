//! # Smart3 Error Handling
//!
//! This module defines the [`Smart3Error`] enum covering the three layers of
//! the driver's error taxonomy: transport errors (serial port, timeout,
//! packet validation), protocol errors (contract violations, retry
//! exhaustion) and cash-register errors (status flags the register reports,
//! plus the domain guards around transactions).

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Smart3Error>;

/// Represents the different error conditions of the Smart3 driver.
///
/// The enum is `Clone` so the operation manager can abort every queued
/// operation with the same error that failed the current one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Smart3Error {
    /// The serial port failed at the I/O level.
    #[error("serial port error: {0}")]
    SerialPort(String),

    /// A framed read did not complete within the receive timeout. Carries
    /// the framer's progress snapshot for diagnostics.
    #[error("receive timeout: expected {expected:?} frame bytes, received {received}, discarded {discarded}")]
    Timeout {
        expected: Option<usize>,
        received: usize,
        discarded: usize,
    },

    /// An inbound frame failed validation (bad length, sequence, CRN,
    /// payload byte, parity or terminator).
    #[error("packet validation failed: {0}")]
    PacketValidation(String),

    /// The dialogue broke the protocol: retry exhaustion, an unexpected
    /// control byte, or an unparseable field.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A message arrived that no declared handler contract accepts.
    #[error("handler contract violation: {0}")]
    ProtocolContract(String),

    /// The register answered CAN: unable to complete the request.
    #[error("the cash register was unable to complete the request")]
    RequestRefused,

    /// The register status reports an operating error.
    #[error("the cash register reported an operating error")]
    OperatingError,

    /// A fiscal or non-fiscal ticket is open on the register.
    #[error("a ticket is open on the cash register")]
    TicketOpen,

    /// Key striking has started on the register keyboard.
    #[error("key striking has started on the cash register")]
    KeyStrikingStarted,

    /// The register status reports a hardware fault.
    #[error("the cash register reported a hardware fault")]
    HardwareFault,

    /// The register status reports a fiscal memory error.
    #[error("the cash register reported a fiscal memory error")]
    FiscalMemoryError,

    /// The fiscal memory of the register is full.
    #[error("the fiscal memory of the cash register is full")]
    FiscalMemoryFull,

    /// The fiscal day is still open on the register.
    #[error("the fiscal day is open on the cash register")]
    FiscalDayOpen,

    /// Another transaction already holds the active-transaction slot.
    #[error("another transaction is already active")]
    TransactionOpen,

    /// A caller-supplied value failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The object is not in a state that permits the call.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The transaction was cooperatively canceled.
    #[error("the operation was canceled")]
    Canceled,
}

impl Smart3Error {
    /// Re-wraps a framing error as a protocol error for propagation out of
    /// an operation. All other variants pass through unchanged.
    pub fn into_protocol(self) -> Smart3Error {
        match self {
            Smart3Error::PacketValidation(reason) => Smart3Error::Protocol(reason),
            other => other,
        }
    }
}
