//! PLU transfer operations: record reads, interactive writes and the bulk
//! broadcast load.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::constants::{
    PLU_BROADCAST_BLOCK, PLU_BROADCAST_CONFIRM, PLU_BROADCAST_TERMINATOR,
};
use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;
use crate::payload::plu::{PluInfo, Price};
use crate::smart3::console::{Console, MessageHandler};
use crate::smart3::serial::SerialLink;
use crate::operations::{
    a01_answer, b23_default, notify, Operation, Progress, ProgressFn, ProgressKind,
    SessionContext,
};

/// Reads the PLU records between two ids (inclusive).
pub struct ReadPluInfo {
    from: String,
    to: String,
    progress: Option<ProgressFn>,
    results: Arc<Mutex<Vec<PluInfo>>>,
}

impl ReadPluInfo {
    /// The two ids are normalised to ordinal-ascending order.
    pub fn new(from: impl Into<String>, to: impl Into<String>, progress: Option<ProgressFn>) -> Self {
        let mut from = from.into();
        let mut to = to.into();
        if from > to {
            std::mem::swap(&mut from, &mut to);
        }
        ReadPluInfo {
            from,
            to,
            progress,
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the records read so far; complete once the
    /// operation finishes.
    pub fn results(&self) -> Arc<Mutex<Vec<PluInfo>>> {
        Arc::clone(&self.results)
    }
}

#[async_trait]
impl<L: SerialLink> Operation<L> for ReadPluInfo {
    fn name(&self) -> &'static str {
        "read-plu-info"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        console.hello(false).await?;
        {
            let reply = format!("0;+4;&M{}:{}", self.from, self.to);
            let mut a01 = a01_answer(session, reply, |_| Ok(()));
            console.answer(&mut a01).await?;
        }

        let mut done = false;
        while !done {
            let results = &self.results;
            let progress = &self.progress;
            let mut handlers = [
                MessageHandler::new(&["C08"], |msg: &MessageData| {
                    match parse_c08_record(msg)? {
                        None => done = true,
                        Some(plu) => {
                            let mut records = results.lock().unwrap();
                            records.push(plu.clone());
                            notify(
                                progress,
                                Progress {
                                    kind: ProgressKind::Reading,
                                    item: Some(plu.id().to_string()),
                                    current: records.len(),
                                    total: 0,
                                },
                            );
                        }
                    }
                    Ok(None)
                }),
                b23_default(),
            ];
            console.answer_any(&mut handlers).await?;
        }
        Ok(())
    }
}

/// Parses one C08 record; `None` is the `*` terminator.
fn parse_c08_record(msg: &MessageData) -> Result<Option<PluInfo>> {
    let id = msg
        .field(3)
        .ok_or_else(|| Smart3Error::Protocol("C08 record is missing its id field".into()))?;
    if id == "*" {
        return Ok(None);
    }
    let price = Price::parse_cents(
        msg.field(4)
            .ok_or_else(|| Smart3Error::Protocol("C08 record is missing the price".into()))?,
    )?;
    let department = msg.int_field(5)? as u8;
    let name = msg
        .field(6)
        .ok_or_else(|| Smart3Error::Protocol("C08 record is missing the name".into()))?;
    let tax = msg.int_field(10)? as u8;
    let macro_code = msg.int_field(11)? as u8;
    PluInfo::new(id, name, price, department, tax, macro_code, 1)
        .map(Some)
        .map_err(|e| Smart3Error::Protocol(format!("C08 record rejected: {e}")))
}

/// Writes PLU records through the `B81` interactivity loop.
pub struct WritePluInfo {
    queue: VecDeque<PluInfo>,
    progress: Option<ProgressFn>,
    total: usize,
}

impl WritePluInfo {
    pub fn new(plus: Vec<PluInfo>, progress: Option<ProgressFn>) -> Self {
        let total = plus.len();
        WritePluInfo {
            queue: plus.into(),
            progress,
            total,
        }
    }
}

#[async_trait]
impl<L: SerialLink> Operation<L> for WritePluInfo {
    fn name(&self) -> &'static str {
        "write-plu-info"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        console.hello(false).await?;
        {
            // Request the B81 interactivity loop.
            let mut a01 = a01_answer(session, "0;+4;*G".into(), |_| Ok(()));
            console.answer(&mut a01).await?;
        }

        let mut done = false;
        let total = self.total;
        while !done {
            let queue = &mut self.queue;
            let progress = &self.progress;
            let mut handlers = [
                MessageHandler::new(&["B81"], |_msg: &MessageData| {
                    let reply = match queue.pop_front() {
                        None => {
                            done = true;
                            MessageData::new("*")?
                        }
                        Some(plu) => {
                            notify(
                                progress,
                                Progress {
                                    kind: ProgressKind::Writing,
                                    item: Some(plu.id().to_string()),
                                    current: total - queue.len(),
                                    total,
                                },
                            );
                            MessageData::new(format!(
                                "{}:{}:{}:{}:0:0:0:{}:{}",
                                plu.id(),
                                plu.price().cents(),
                                plu.department(),
                                plu.name(),
                                plu.tax(),
                                plu.macro_code(),
                            ))?
                        }
                    };
                    Ok(Some(reply))
                }),
                b23_default(),
            ];
            console.answer_any(&mut handlers).await?;
        }
        Ok(())
    }
}

/// Loads PLU records in bulk over broadcast frames, in confirmed blocks of
/// one hundred.
pub struct BroadcastPluInfo {
    plus: Vec<PluInfo>,
    progress: Option<ProgressFn>,
}

impl BroadcastPluInfo {
    /// Duplicated ids collapse to their first occurrence; the records are
    /// loaded in ordinal id order.
    pub fn new(plus: Vec<PluInfo>, progress: Option<ProgressFn>) -> Self {
        let mut plus = plus;
        plus.sort();
        plus.dedup();
        BroadcastPluInfo { plus, progress }
    }
}

#[async_trait]
impl<L: SerialLink> Operation<L> for BroadcastPluInfo {
    fn name(&self) -> &'static str {
        "broadcast-plu-info"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        let total = self.plus.len();
        console.hello(false).await?;
        {
            let mut a01 = a01_answer(session, format!("0;+4;#z{total}"), |_| Ok(()));
            console.answer(&mut a01).await?;
        }

        // Records confirmed by the register at a block boundary.
        let mut confirmed = 0usize;
        while confirmed < total {
            let block_end = (confirmed + PLU_BROADCAST_BLOCK).min(total);
            for (index, plu) in self.plus[confirmed..block_end].iter().enumerate() {
                console.broadcast(&plu.encode_broadcast_record()).await?;
                notify(
                    &self.progress,
                    Progress {
                        kind: ProgressKind::Writing,
                        item: Some(plu.id().to_string()),
                        current: confirmed + index + 1,
                        total,
                    },
                );
            }
            console.broadcast(&[PLU_BROADCAST_CONFIRM]).await?;

            // The register reports how many records it has accepted in
            // total; short of the block end means the block must be sent
            // again from the last confirmed position.
            let mut accepted = 0usize;
            loop {
                let mut handled_b99 = false;
                {
                    let accepted = &mut accepted;
                    let handled = &mut handled_b99;
                    let mut handlers = [
                        MessageHandler::new(&["B99"], |msg: &MessageData| {
                            *accepted = usize::try_from(msg.int_field(1)?).map_err(|_| {
                                Smart3Error::Protocol("B99 loaded count is negative".into())
                            })?;
                            *handled = true;
                            Ok(Some(MessageData::new(accepted.to_string())?))
                        }),
                        b23_default(),
                    ];
                    console.answer_any(&mut handlers).await?;
                }
                if handled_b99 {
                    break;
                }
            }
            if accepted >= block_end {
                confirmed = block_end;
            } else {
                log::warn!(
                    "register accepted {accepted} of {block_end} broadcast records, rewinding to {confirmed}"
                );
            }
        }

        console.broadcast(&[PLU_BROADCAST_TERMINATOR]).await?;
        // The register needs a moment to settle the bulk load.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        Ok(())
    }
}
