//! The sale transaction operation.
//!
//! Drives a complete ticket through keyboard simulation: the mode change
//! into Registering clears any pending input and sells the first item, the
//! `B14` item-sale prompts chain through the remaining items, and the
//! subtotal/total/payment/ticket-end prompts settle the ticket.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::{Result, Smart3Error};
use crate::keyboard::keyboard_command;
use crate::payload::message::MessageData;
use crate::payload::plu::{PluInfo, Price};
use crate::smart3::console::{Console, MessageHandler};
use crate::smart3::serial::SerialLink;
use crate::operations::{
    a01_answer, notify, Operation, Progress, ProgressFn, ProgressKind, SessionContext,
    DEFAULT_COMMAND,
};

/// Sells a list of items and settles the ticket with one payment.
pub struct Transact {
    items: VecDeque<PluInfo>,
    payment: Price,
    progress: Option<ProgressFn>,
    total: usize,
}

impl Transact {
    pub fn new(items: Vec<PluInfo>, payment: Price, progress: Option<ProgressFn>) -> Self {
        let total = items.len();
        Transact {
            items: items.into(),
            payment,
            progress,
            total,
        }
    }

    fn sold(&self) -> usize {
        self.total - self.items.len()
    }
}

#[async_trait]
impl<L: SerialLink> Operation<L> for Transact {
    fn name(&self) -> &'static str {
        "transact"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        if self.items.is_empty() {
            return Err(Smart3Error::InvalidOperation(
                "a transaction needs at least one item".into(),
            ));
        }
        console.hello(false).await?;
        {
            // Registering mode.
            let mut a01 = a01_answer(session, "0;+1".into(), |_| Ok(()));
            console.answer(&mut a01).await?;
        }
        {
            // The mode change clears pending input twice and sells the
            // first item.
            let first = self.items.pop_front().ok_or_else(|| {
                Smart3Error::InvalidOperation("a transaction needs at least one item".into())
            })?;
            notify(
                &self.progress,
                Progress {
                    kind: ProgressKind::Selling,
                    item: Some(first.id().to_string()),
                    current: self.sold(),
                    total: self.total,
                },
            );
            let sequence = format!(
                "$CLEAR$$CLEAR${}*{}$PLU$",
                first.quantity(),
                first.id()
            );
            let mut b23 =
                MessageHandler::new(&["B23"], move |_| Ok(Some(keyboard_command(&sequence, false)?)));
            console.answer(&mut b23).await?;
        }

        // Ticket-start and item-sale prompts; B14 chains the remaining
        // items and leaves the loop with the subtotal.
        let mut subtotal_sent = false;
        while !subtotal_sent {
            let items = &mut self.items;
            let progress = &self.progress;
            let total = self.total;
            let sold_before = total - items.len();
            let mut handlers = [
                MessageHandler::new(&["B10"], |_msg: &MessageData| {
                    Ok(Some(MessageData::new(DEFAULT_COMMAND)?))
                }),
                MessageHandler::new(&["B14"], |_msg: &MessageData| {
                    let reply = match items.pop_front() {
                        Some(item) => {
                            notify(
                                progress,
                                Progress {
                                    kind: ProgressKind::Selling,
                                    item: Some(item.id().to_string()),
                                    current: sold_before,
                                    total,
                                },
                            );
                            keyboard_command(
                                &format!("{}*{}$PLU$", item.quantity(), item.id()),
                                false,
                            )?
                        }
                        None => {
                            subtotal_sent = true;
                            keyboard_command("$SUBTOTAL$", false)?
                        }
                    };
                    Ok(Some(reply))
                }),
            ];
            console.answer_any(&mut handlers).await?;
        }

        {
            // Subtotal prompt: type the payment amount and strike TOTAL.
            let payment = self.payment;
            let mut b15 = MessageHandler::new(&["B15"], move |_| {
                Ok(Some(keyboard_command(&format!("{payment}$TOTAL$"), false)?))
            });
            console.answer(&mut b15).await?;
        }
        {
            // Payment start.
            let mut b17 = MessageHandler::new(&["B17"], |_: &MessageData| {
                Ok(Some(MessageData::new(DEFAULT_COMMAND)?))
            });
            console.answer(&mut b17).await?;
        }
        {
            // Ticket end.
            let mut b18 = MessageHandler::new(&["B18"], |_: &MessageData| {
                Ok(Some(MessageData::new(DEFAULT_COMMAND)?))
            });
            console.answer(&mut b18).await?;
        }
        Ok(())
    }
}
