//! The operation catalog.
//!
//! Each operation is a short scripted conversation with the register. All
//! of them open by requesting a hello and consuming the `A01` reply through
//! the shared status handler, which updates the session context and
//! translates error flags into typed errors; the register may interleave a
//! `B23` mode-change prompt, answered with the default empty command unless
//! the operation scripts otherwise.

pub mod fiscal;
pub mod plu;
pub mod session;
pub mod transact;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, Smart3Error};
use crate::payload::connectability::ConnectabilityProgramming;
use crate::payload::message::MessageData;
use crate::payload::status::CashRegisterStatus;
use crate::smart3::console::{Console, MessageHandler};
use crate::smart3::serial::SerialLink;

pub use fiscal::{FinancialReportOperation, FiscalClosing};
pub use plu::{BroadcastPluInfo, ReadPluInfo, WritePluInfo};
pub use session::{Keepalive, Shutdown, Startup};
pub use transact::Transact;

/// The reply sent when an interactivity prompt needs no command.
pub const DEFAULT_COMMAND: &str = "0";

/// Per-session state shared by every operation executed on one worker.
#[derive(Debug, Default)]
pub struct SessionContext {
    /// Most recently parsed register status.
    pub status: Option<CashRegisterStatus>,
    /// Communication programming read during startup.
    pub connectability: ConnectabilityProgramming,
}

/// What an operation is currently moving over the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Reading,
    Writing,
    Selling,
}

/// A progress notification emitted while an operation runs.
#[derive(Debug, Clone)]
pub struct Progress {
    pub kind: ProgressKind,
    /// Identifier of the item being moved, when one applies.
    pub item: Option<String>,
    pub current: usize,
    /// Zero when the total is not known up front.
    pub total: usize,
}

/// Callback object receiving progress notifications.
pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

pub(crate) fn notify(progress: &Option<ProgressFn>, event: Progress) {
    if let Some(f) = progress {
        f(event);
    }
}

/// A scripted conversation with the register.
#[async_trait]
pub trait Operation<L: SerialLink>: Send {
    fn name(&self) -> &'static str;

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()>;
}

/// Flags every operation treats as fatal the moment they are observed.
pub(crate) fn check_common_status(status: &CashRegisterStatus) -> Result<()> {
    if status.flags.operating_error {
        return Err(Smart3Error::OperatingError);
    }
    if status.flags.hardware_fault {
        return Err(Smart3Error::HardwareFault);
    }
    Ok(())
}

/// Builds the shared `A01` answerer: parse the status block, run the common
/// and operation-specific checks, record the status in the session and
/// reply with the operation's opening command.
pub(crate) fn a01_answer<'a>(
    session: &'a mut SessionContext,
    reply: String,
    extra: impl Fn(&CashRegisterStatus) -> Result<()> + Send + 'a,
) -> MessageHandler<'a> {
    MessageHandler::new(&["A01"], move |msg| {
        let status = CashRegisterStatus::parse(msg)?;
        check_common_status(&status)?;
        extra(&status)?;
        session.status = Some(status);
        MessageData::new(reply.clone()).map(Some)
    })
}

/// The default `B23` mode-change answerer.
pub(crate) fn b23_default<'a>() -> MessageHandler<'a> {
    MessageHandler::new(&["B23"], |_| Ok(Some(MessageData::new(DEFAULT_COMMAND)?)))
}
