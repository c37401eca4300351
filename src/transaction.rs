//! The multi-phase sale transaction controller.
//!
//! A transaction moves through `Initialized → Starting → {Rejected |
//! Waiting} → Completing → {Completed | Faulted}`, with `Canceled`
//! reachable cooperatively from every non-terminal phase. While the
//! transaction waits for the operator's confirmation a keepalive loop holds
//! the session open; `end` re-raises any error the loop captured.
//! Cancellation is sampled only between sub-operations and acknowledged by
//! the running task, so status transitions stay atomic.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{Result, Smart3Error};
use crate::operations::{Keepalive, ProgressFn, ReadPluInfo, Transact, WritePluInfo};
use crate::operation_manager::OperationManager;
use crate::payload::plu::{PluInfo, Price};
use crate::smart3::serial::SerialLink;

/// The lifecycle phase of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Initialized,
    Starting,
    Waiting,
    Completing,
    Completed,
    Canceled,
    Rejected,
    Faulted,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Canceled
                | TransactionStatus::Rejected
                | TransactionStatus::Faulted
        )
    }
}

/// One line of a sale request: a PLU id and the quantity sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleItem {
    pub id: String,
    pub quantity: u32,
}

impl SaleItem {
    pub fn new(id: impl Into<String>, quantity: u32) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Smart3Error::InvalidArgument("sale item id is empty".into()));
        }
        if !(1..=99_999).contains(&quantity) {
            return Err(Smart3Error::InvalidArgument(format!(
                "sale quantity {quantity} out of range 1..=99999"
            )));
        }
        Ok(SaleItem { id, quantity })
    }
}

/// How often the keepalive loop pings the register while waiting.
const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(1000);

struct KeepaliveStop {
    stopping: AtomicBool,
    notify: Notify,
}

struct KeepaliveLoop {
    stop: Arc<KeepaliveStop>,
    task: JoinHandle<Option<Smart3Error>>,
}

/// Controller for a single sale.
pub struct Transaction<L: SerialLink + 'static> {
    manager: OperationManager<L>,
    /// Process-wide slot; only one transaction may be active.
    active_slot: Arc<AtomicBool>,
    items: Vec<SaleItem>,
    progress: Option<ProgressFn>,
    status: Mutex<TransactionStatus>,
    /// Items found on the register, carrying the caller's quantities.
    continued: Mutex<Vec<PluInfo>>,
    /// Requested items the register does not know.
    discontinued: Mutex<Vec<SaleItem>>,
    /// Ids the caller changed while waiting; written back before the sale.
    dirty: Mutex<HashSet<String>>,
    frozen: AtomicBool,
    keepalive: Mutex<Option<KeepaliveLoop>>,
    cancel_requested: AtomicBool,
    cancel_ack: Notify,
    /// Once the sale operation is enqueued cancellation is denied.
    past_transact: AtomicBool,
}

impl<L: SerialLink + 'static> Transaction<L> {
    pub(crate) fn new(
        manager: OperationManager<L>,
        active_slot: Arc<AtomicBool>,
        items: Vec<SaleItem>,
        progress: Option<ProgressFn>,
    ) -> Self {
        Transaction {
            manager,
            active_slot,
            items,
            progress,
            status: Mutex::new(TransactionStatus::Initialized),
            continued: Mutex::new(Vec::new()),
            discontinued: Mutex::new(Vec::new()),
            dirty: Mutex::new(HashSet::new()),
            frozen: AtomicBool::new(false),
            keepalive: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            cancel_ack: Notify::new(),
            past_transact: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> TransactionStatus {
        *self.status.lock().unwrap()
    }

    /// Items confirmed by the register, with the caller's quantities.
    pub fn continued(&self) -> Vec<PluInfo> {
        self.continued.lock().unwrap().clone()
    }

    /// Requested items the register did not recognise.
    pub fn discontinued(&self) -> Vec<SaleItem> {
        self.discontinued.lock().unwrap().clone()
    }

    /// Looks every requested item up on the register. Returns `true` and
    /// moves to `Waiting` when all items exist; returns `false` and moves
    /// to `Rejected` when any item is unknown.
    pub async fn begin(&self) -> Result<bool> {
        self.transition(TransactionStatus::Initialized, TransactionStatus::Starting)?;
        if self
            .active_slot
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.set_status(TransactionStatus::Initialized);
            return Err(Smart3Error::TransactionOpen);
        }

        let outcome = self.lookup_items().await;
        match outcome {
            Err(Smart3Error::Canceled) => Err(Smart3Error::Canceled),
            Err(e) => {
                self.set_status(TransactionStatus::Faulted);
                self.release_slot();
                Err(e)
            }
            Ok(()) => {
                if self.discontinued.lock().unwrap().is_empty() {
                    self.set_status(TransactionStatus::Waiting);
                    self.start_keepalive();
                    Ok(true)
                } else {
                    self.set_status(TransactionStatus::Rejected);
                    self.release_slot();
                    Ok(false)
                }
            }
        }
    }

    async fn lookup_items(&self) -> Result<()> {
        for item in group_items(&self.items) {
            self.checkpoint()?;
            let read = ReadPluInfo::new(item.id.clone(), item.id.clone(), None);
            let results = read.results();
            completion(self.manager.enqueue(Box::new(read))).await?;
            let found = {
                let records = results.lock().unwrap();
                records.iter().find(|p| p.id() == item.id).cloned()
            };
            match found {
                Some(plu) => {
                    let plu = plu.with_quantity(item.quantity)?;
                    self.continued.lock().unwrap().push(plu);
                }
                None => self.discontinued.lock().unwrap().push(item),
            }
        }
        self.checkpoint()?;
        Ok(())
    }

    /// Replaces a confirmed item with updated programming; the changed
    /// subset is written back to the register by `end`. Only allowed while
    /// the transaction waits for confirmation.
    pub fn update_plu(&self, plu: PluInfo) -> Result<()> {
        if self.status() != TransactionStatus::Waiting || self.frozen.load(Ordering::Acquire) {
            return Err(Smart3Error::InvalidOperation(
                "items can only change while the transaction is waiting".into(),
            ));
        }
        let mut continued = self.continued.lock().unwrap();
        match continued.iter_mut().find(|p| p.id() == plu.id()) {
            Some(slot) => {
                *slot = plu;
                self.dirty.lock().unwrap().insert(slot.id().to_string());
                Ok(())
            }
            None => Err(Smart3Error::InvalidArgument(format!(
                "PLU {:?} is not part of this transaction",
                plu.id()
            ))),
        }
    }

    /// Settles the sale: writes back caller changes, runs the transaction
    /// operation with the payment, and reports the terminal status.
    pub async fn end(&self, payment: Price) -> Result<()> {
        self.transition(TransactionStatus::Waiting, TransactionStatus::Completing)?;
        let keepalive_error = self.stop_keepalive().await;
        self.frozen.store(true, Ordering::Release);

        let outcome = self.complete(payment, keepalive_error).await;
        match &outcome {
            Ok(()) => self.set_status(TransactionStatus::Completed),
            Err(Smart3Error::Canceled) => {}
            Err(_) => self.set_status(TransactionStatus::Faulted),
        }
        self.frozen.store(false, Ordering::Release);
        self.release_slot();
        outcome
    }

    async fn complete(
        &self,
        payment: Price,
        keepalive_error: Option<Smart3Error>,
    ) -> Result<()> {
        if let Some(e) = keepalive_error {
            return Err(e);
        }
        let (items, total) = {
            let continued = self.continued.lock().unwrap();
            let total: i64 = continued
                .iter()
                .map(|p| p.price().cents() * i64::from(p.quantity()))
                .sum();
            (continued.clone(), total)
        };
        if payment.cents() <= 0 || payment.cents() < total {
            return Err(Smart3Error::InvalidOperation(format!(
                "payment {payment} does not cover the transaction total {}",
                Price::from_cents(total)
            )));
        }
        self.checkpoint()?;

        let changed: Vec<PluInfo> = {
            let dirty = self.dirty.lock().unwrap();
            items
                .iter()
                .filter(|p| dirty.contains(p.id()))
                .cloned()
                .collect()
        };
        if !changed.is_empty() {
            completion(
                self.manager
                    .enqueue(Box::new(WritePluInfo::new(changed, self.progress.clone()))),
            )
            .await?;
        }

        self.checkpoint()?;
        let sale = Transact::new(items, payment, self.progress.clone());
        let pending = self.manager.enqueue(Box::new(sale));
        self.past_transact.store(true, Ordering::Release);
        completion(pending).await
    }

    /// Requests cancellation. Returns `true` when the transaction ends up
    /// canceled, `false` when cancellation is impossible (already past the
    /// sale, or already in another terminal state). Idempotent.
    pub async fn cancel(&self) -> bool {
        loop {
            match self.status() {
                TransactionStatus::Initialized => {
                    if self
                        .transition(TransactionStatus::Initialized, TransactionStatus::Canceled)
                        .is_ok()
                    {
                        return true;
                    }
                    // Lost the race with begin; dispatch on the new phase.
                }
                TransactionStatus::Starting | TransactionStatus::Completing => {
                    if self.past_transact.load(Ordering::Acquire) {
                        return false;
                    }
                    self.cancel_requested.store(true, Ordering::Release);
                    // Wait for the running task to reach a checkpoint and
                    // acknowledge, then dispatch on whatever it left.
                    let _ = tokio::time::timeout(
                        Duration::from_millis(50),
                        self.cancel_ack.notified(),
                    )
                    .await;
                }
                TransactionStatus::Waiting => {
                    // Any keepalive failure no longer matters.
                    let _ = self.stop_keepalive().await;
                    if self
                        .transition(TransactionStatus::Waiting, TransactionStatus::Canceled)
                        .is_ok()
                    {
                        self.release_slot();
                        return true;
                    }
                }
                TransactionStatus::Canceled => return true,
                TransactionStatus::Completed
                | TransactionStatus::Rejected
                | TransactionStatus::Faulted => return false,
            }
        }
    }

    /// Cancellation checkpoint between sub-operations.
    fn checkpoint(&self) -> Result<()> {
        if self.cancel_requested.load(Ordering::Acquire) {
            self.set_status(TransactionStatus::Canceled);
            self.release_slot();
            self.cancel_ack.notify_waiters();
            return Err(Smart3Error::Canceled);
        }
        Ok(())
    }

    fn start_keepalive(&self) {
        let stop = Arc::new(KeepaliveStop {
            stopping: AtomicBool::new(false),
            notify: Notify::new(),
        });
        let manager = self.manager.clone();
        let stop_handle = Arc::clone(&stop);
        let task = tokio::spawn(async move {
            loop {
                if stop_handle.stopping.load(Ordering::Acquire) {
                    return None;
                }
                let pending = manager.enqueue(Box::new(Keepalive));
                match completion(pending).await {
                    Ok(()) => {}
                    Err(e) => {
                        log::warn!("keepalive failed: {e}");
                        return Some(e);
                    }
                }
                if stop_handle.stopping.load(Ordering::Acquire) {
                    return None;
                }
                let _ = tokio::time::timeout(
                    KEEPALIVE_INTERVAL,
                    stop_handle.notify.notified(),
                )
                .await;
            }
        });
        *self.keepalive.lock().unwrap() = Some(KeepaliveLoop { stop, task });
    }

    /// Stops the keepalive loop and returns any error it captured.
    async fn stop_keepalive(&self) -> Option<Smart3Error> {
        let running = self.keepalive.lock().unwrap().take()?;
        running.stop.stopping.store(true, Ordering::Release);
        running.stop.notify.notify_waiters();
        match running.task.await {
            Ok(captured) => captured,
            Err(_) => Some(Smart3Error::Protocol("keepalive loop panicked".into())),
        }
    }

    fn transition(&self, from: TransactionStatus, to: TransactionStatus) -> Result<()> {
        let mut status = self.status.lock().unwrap();
        if *status != from {
            return Err(Smart3Error::InvalidOperation(format!(
                "transaction is {:?}, expected {from:?}",
                *status
            )));
        }
        *status = to;
        Ok(())
    }

    fn set_status(&self, to: TransactionStatus) {
        *self.status.lock().unwrap() = to;
    }

    fn release_slot(&self) {
        self.active_slot.store(false, Ordering::Release);
    }
}

/// Groups sale items by id, summing quantities, preserving first-seen
/// order.
fn group_items(items: &[SaleItem]) -> Vec<SaleItem> {
    let mut grouped: Vec<SaleItem> = Vec::new();
    for item in items {
        match grouped.iter_mut().find(|g| g.id == item.id) {
            Some(existing) => existing.quantity += item.quantity,
            None => grouped.push(item.clone()),
        }
    }
    grouped
}

/// Awaits an operation completion, treating a dropped channel as a protocol
/// failure.
async fn completion(rx: tokio::sync::oneshot::Receiver<Result<()>>) -> Result<()> {
    match rx.await {
        Ok(outcome) => outcome,
        Err(_) => Err(Smart3Error::Protocol(
            "operation completion channel dropped".into(),
        )),
    }
}
