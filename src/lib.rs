//! # smart3-rs - Host-Side Driver for Smart3 Fiscal Cash Registers
//!
//! The smart3-rs crate drives a point-of-sale fiscal cash register speaking
//! the byte-oriented Smart3 serial protocol over RS-232 or RS-485. The host
//! is the secondary party on the link: it requests status from the
//! register, answers the register's interactive prompts and injects
//! keyboard-simulation commands to drive sales.
//!
//! ## Features
//!
//! - Framed packet layer with per-physical-layer validation state machines
//! - Request/acknowledgement transceiver with RS-485 enquiry polling
//! - Contract-checked dialogue console with bounded retries
//! - Scripted operations: session startup/shutdown, keepalive, PLU
//!   read/write/broadcast, financial report, fiscal closing and sales
//! - A serialised operation manager owning the serial port per session
//! - A multi-phase transaction controller with cooperative cancellation
//!
//! ## Usage
//!
//! ```no_run
//! use smart3_rs::{Smart3Config, Smart3Device};
//!
//! # async fn demo() -> Result<(), smart3_rs::Smart3Error> {
//! let mut config = Smart3Config::default();
//! config.port_name = "/dev/ttyUSB0".to_string();
//! let device = Smart3Device::new(config);
//! let report = device.financial_report().await?;
//! println!("drawer: {}", report.drawer_amount);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod keyboard;
pub mod logging;
pub mod operation_manager;
pub mod operations;
pub mod payload;
pub mod smart3;
pub mod transaction;
pub mod util;

pub use config::{PhysicalLayer, Smart3BaudRate, Smart3Config};
pub use device::Smart3Device;
pub use error::{Result, Smart3Error};
pub use logging::{init_logger, log_debug, log_error, log_info, log_warn};
pub use operation_manager::OperationManager;
pub use operations::{Progress, ProgressFn, ProgressKind};
pub use payload::{
    CashRegisterStatus, ConnectabilityProgramming, FinancialReport, MessageData, OperatingMode,
    PluInfo, Price,
};
pub use smart3::{Console, MessageHandler, MockSerialPort, Packet, PacketFramer, Transceiver};
pub use transaction::{SaleItem, Transaction, TransactionStatus};
