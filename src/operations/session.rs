//! Session bracket operations: startup, shutdown and keepalive.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;
use crate::smart3::console::{Console, MessageHandler};
use crate::smart3::serial::SerialLink;
use crate::operations::{a01_answer, b23_default, Operation, SessionContext, DEFAULT_COMMAND};

/// Opens a session: locks the register keyboard, enters Programming mode
/// and reads the connectability programming record series.
#[derive(Debug, Default)]
pub struct Startup;

#[async_trait]
impl<L: SerialLink> Operation<L> for Startup {
    fn name(&self) -> &'static str {
        "startup"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        console.hello(false).await?;
        {
            // Lock the keyboard with deferred effect, enter Programming
            // mode and request the connectability transmission.
            let mut a01 = a01_answer(session, "0;*2;+4;&m".into(), |status| {
                if status.flags.ticket_open || status.flags.non_fiscal_ticket_open {
                    return Err(Smart3Error::TicketOpen);
                }
                if status.flags.key_striking_started {
                    return Err(Smart3Error::KeyStrikingStarted);
                }
                Ok(())
            });
            console.answer(&mut a01).await?;
        }

        let mut done = false;
        while !done {
            let mut handlers = [
                MessageHandler::new(&["C24"], |msg: &MessageData| {
                    done = session.connectability.apply_record(msg)?;
                    Ok(None)
                }),
                b23_default(),
            ];
            console.answer_any(&mut handlers).await?;
        }
        log::info!(
            "session opened with {} (serial {})",
            session
                .status
                .as_ref()
                .map(|s| s.device_name.as_str())
                .unwrap_or("?"),
            session
                .status
                .as_ref()
                .map(|s| s.serial_number.as_str())
                .unwrap_or("?"),
        );
        Ok(())
    }
}

/// Closes a session: returns the register to Inactive mode, removes the
/// keyboard lock and absorbs the register's final hello retransmits before
/// letting its disconnection timer elapse.
#[derive(Debug, Default)]
pub struct Shutdown;

#[async_trait]
impl<L: SerialLink> Operation<L> for Shutdown {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        console.hello(false).await?;
        {
            let mut a01 = a01_answer(session, "0;+0;*3".into(), |_| Ok(()));
            console.answer(&mut a01).await?;
        }
        {
            // Request an immediate final hello on the mode change.
            let mut b23 =
                MessageHandler::new(&["B23"], |_| Ok(Some(MessageData::new("0;#A")?)));
            console.answer(&mut b23).await?;
        }
        // The final hello is never acknowledged, so the register repeats it
        // up to its retransmission limit; absorb every copy.
        for _ in 0..=session.connectability.retransmissions {
            console.swallow().await?;
        }
        // The register drops the connection only after its own timer runs
        // out; found empirically, keep in step with it.
        tokio::time::sleep(Duration::from_millis(session.connectability.timeout_ms)).await;
        Ok(())
    }
}

/// One hello/status exchange, used to keep the session alive while a
/// transaction waits for confirmation.
#[derive(Debug, Default)]
pub struct Keepalive;

#[async_trait]
impl<L: SerialLink> Operation<L> for Keepalive {
    fn name(&self) -> &'static str {
        "keepalive"
    }

    async fn execute(
        &mut self,
        console: &mut Console<L>,
        session: &mut SessionContext,
    ) -> Result<()> {
        console.hello(false).await?;
        let mut a01 = a01_answer(session, DEFAULT_COMMAND.into(), |_| Ok(()));
        console.answer(&mut a01).await?;
        Ok(())
    }
}
