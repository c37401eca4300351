//! Fiscal operations: the financial report and the end-of-day closing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;
use crate::payload::report::FinancialReport;
use crate::smart3::console::{Console, MessageHandler};
use crate::smart3::serial::SerialLink;
use crate::operations::{a01_answer, b23_default, Operation, SessionContext, DEFAULT_COMMAND};

/// Reads the financial report record series.
pub struct FinancialReportOperation {
    report: Arc<Mutex<FinancialReport>>,
}

impl FinancialReportOperation {
    pub fn new() -> Self {
        FinancialReportOperation {
            report: Arc::new(Mutex::new(FinancialReport::default())),
        }
    }

    /// Shared handle to the accumulating report; complete once the
    /// operation finishes.
    pub fn report(&self) -> Arc<Mutex<FinancialReport>> {
        Arc::clone(&self.report)
    }
}

impl Default for FinancialReportOperation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<L: SerialLink> Operation<L> for FinancialReportOperation {
    fn name(&self) -> &'static str {
        "financial-report"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        console.hello(false).await?;
        {
            // Reading mode, report transmission request.
            let mut a01 = a01_answer(session, "0;+2;*f".into(), |_| Ok(()));
            console.answer(&mut a01).await?;
        }

        let mut done = false;
        while !done {
            let report = &self.report;
            let mut handlers = [
                MessageHandler::new(&["C22"], |msg: &MessageData| {
                    done = report.lock().unwrap().apply_record(msg)?;
                    Ok(None)
                }),
                b23_default(),
            ];
            console.answer_any(&mut handlers).await?;
        }
        Ok(())
    }
}

/// Performs the end-of-day fiscal closing.
#[derive(Debug, Default)]
pub struct FiscalClosing;

#[async_trait]
impl<L: SerialLink> Operation<L> for FiscalClosing {
    fn name(&self) -> &'static str {
        "fiscal-closing"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        console.hello(false).await?;
        {
            // Closing mode, Z-closing request. A register whose fiscal
            // memory is failing or full must not start the closing.
            let mut a01 = a01_answer(session, "0;+3;#Z".into(), |status| {
                if status.flags.fiscal_memory_error {
                    return Err(Smart3Error::FiscalMemoryError);
                }
                if status.flags.fiscal_memory_full {
                    return Err(Smart3Error::FiscalMemoryFull);
                }
                Ok(())
            });
            console.answer(&mut a01).await?;
        }

        loop {
            let mut handlers = [
                MessageHandler::new(&["B45"], |_msg: &MessageData| {
                    Ok(Some(MessageData::new(DEFAULT_COMMAND)?))
                }),
                b23_default(),
            ];
            if console.answer_any(&mut handlers).await? == "B45" {
                break;
            }
        }
        Ok(())
    }
}
