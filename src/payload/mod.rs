//! The payload module contains the message-level data of the Smart3
//! protocol: the field-structured message text and the typed records parsed
//! from it.

pub mod connectability;
pub mod message;
pub mod plu;
pub mod report;
pub mod status;

pub use connectability::ConnectabilityProgramming;
pub use message::MessageData;
pub use plu::{PluInfo, Price};
pub use report::FinancialReport;
pub use status::{CashRegisterStatus, OperatingMode, StatusFlags, StatusTimestamp};
