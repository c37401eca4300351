//! The crate's entry point for talking to one cash register.
//!
//! [`Smart3Device`] owns the operation manager and the process-wide
//! active-transaction slot. Every entry point refuses while a transaction
//! is active; the transaction itself claims the slot in `begin`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Smart3Config;
use crate::error::{Result, Smart3Error};
use crate::operations::{
    BroadcastPluInfo, FinancialReportOperation, Keepalive, FiscalClosing, ProgressFn,
    ReadPluInfo, WritePluInfo,
};
use crate::operation_manager::OperationManager;
use crate::payload::plu::PluInfo;
use crate::payload::report::FinancialReport;
use crate::smart3::serial::SerialLink;
use crate::transaction::{SaleItem, Transaction};

/// Handle to one Smart3 cash register.
pub struct Smart3Device<L: SerialLink + 'static> {
    manager: OperationManager<L>,
    active_transaction: Arc<AtomicBool>,
}

impl Smart3Device<tokio_serial::SerialStream> {
    /// Device over the OS serial port named in the configuration.
    pub fn new(config: Smart3Config) -> Self {
        Smart3Device {
            manager: OperationManager::new(config),
            active_transaction: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<L: SerialLink + 'static> Smart3Device<L> {
    /// Device with an injected link factory; used by tests.
    pub fn with_link_factory(
        config: Smart3Config,
        link_factory: impl Fn() -> Result<L> + Send + Sync + 'static,
    ) -> Self {
        Smart3Device {
            manager: OperationManager::with_link_factory(config, link_factory),
            active_transaction: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reads the PLU records between the two ids (inclusive).
    pub async fn read_plu_infos(
        &self,
        from: &str,
        to: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Vec<PluInfo>> {
        self.ensure_no_transaction()?;
        let op = ReadPluInfo::new(from, to, progress);
        let results = op.results();
        self.complete(self.manager.enqueue(Box::new(op))).await?;
        let records = results.lock().unwrap().clone();
        Ok(records)
    }

    /// Writes PLU records through the interactive programming loop.
    pub async fn write_plu_infos(
        &self,
        plus: Vec<PluInfo>,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.ensure_no_transaction()?;
        self.complete(
            self.manager
                .enqueue(Box::new(WritePluInfo::new(plus, progress))),
        )
        .await
    }

    /// Loads PLU records in bulk over broadcast frames.
    pub async fn broadcast_plu_infos(
        &self,
        plus: Vec<PluInfo>,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.ensure_no_transaction()?;
        self.complete(
            self.manager
                .enqueue(Box::new(BroadcastPluInfo::new(plus, progress))),
        )
        .await
    }

    /// Reads the financial report.
    pub async fn financial_report(&self) -> Result<FinancialReport> {
        self.ensure_no_transaction()?;
        let op = FinancialReportOperation::new();
        let report = op.report();
        self.complete(self.manager.enqueue(Box::new(op))).await?;
        let report = report.lock().unwrap().clone();
        Ok(report)
    }

    /// Performs the end-of-day fiscal closing.
    pub async fn fiscal_closing(&self) -> Result<()> {
        self.ensure_no_transaction()?;
        self.complete(self.manager.enqueue(Box::new(FiscalClosing))).await
    }

    /// One hello/status exchange.
    pub async fn keepalive(&self) -> Result<()> {
        self.ensure_no_transaction()?;
        self.complete(self.manager.enqueue(Box::new(Keepalive))).await
    }

    /// Creates the controller for a sale. The transaction claims the
    /// active slot in `begin`, which blocks every other entry point until
    /// it reaches a terminal state.
    pub fn transaction(
        &self,
        items: Vec<SaleItem>,
        progress: Option<ProgressFn>,
    ) -> Transaction<L> {
        Transaction::new(
            self.manager.clone(),
            Arc::clone(&self.active_transaction),
            items,
            progress,
        )
    }

    fn ensure_no_transaction(&self) -> Result<()> {
        if self.active_transaction.load(Ordering::Acquire) {
            return Err(Smart3Error::TransactionOpen);
        }
        Ok(())
    }

    async fn complete(
        &self,
        rx: tokio::sync::oneshot::Receiver<Result<()>>,
    ) -> Result<()> {
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Smart3Error::Protocol(
                "operation completion channel dropped".into(),
            )),
        }
    }
}
