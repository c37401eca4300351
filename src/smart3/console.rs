//! Typed dialogue console.
//!
//! The console enforces the handler/message-type contract of every
//! exchange: a handler declares which message types it accepts, and the
//! console refuses to invoke it for anything else. A handler that returns a
//! reply runs through the acknowledged send loop; a handler that returns
//! nothing has the message acknowledged on its behalf.

use crate::constants::{ACK, BEL, CAN, NAK, SYN};
use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;
use crate::smart3::serial::SerialLink;
use crate::smart3::transceiver::Transceiver;

/// Bound on dialogue retries, for reads (NAK-and-listen-again on a corrupt
/// frame) and writes (retransmit on NAK) alike.
pub const MAX_RETRIES: u32 = 3;

/// A dialogue handler: the set of message types it accepts, paired with the
/// function that consumes a message and optionally produces the reply.
pub struct MessageHandler<'a> {
    accepts: &'static [&'static str],
    handle: Box<dyn FnMut(&MessageData) -> Result<Option<MessageData>> + Send + 'a>,
}

impl<'a> MessageHandler<'a> {
    pub fn new(
        accepts: &'static [&'static str],
        handle: impl FnMut(&MessageData) -> Result<Option<MessageData>> + Send + 'a,
    ) -> Self {
        MessageHandler {
            accepts,
            handle: Box::new(handle),
        }
    }

    pub fn accepts(&self, message_type: &str) -> bool {
        self.accepts.contains(&message_type)
    }

    fn invoke(&mut self, msg: &MessageData) -> Result<Option<MessageData>> {
        (self.handle)(msg)
    }
}

/// The dialogue layer over one transceiver.
pub struct Console<L: SerialLink> {
    tcv: Transceiver<L>,
}

impl<L: SerialLink> Console<L> {
    pub fn new(tcv: Transceiver<L>) -> Self {
        Console { tcv }
    }

    pub fn transceiver(&self) -> &Transceiver<L> {
        &self.tcv
    }

    /// Requests a status hello. No reply is consumed here; the register
    /// answers with an `A01` message in its own time.
    pub async fn hello(&mut self, immediate: bool) -> Result<()> {
        self.tcv.send_hello_request(immediate).await
    }

    /// Receives a message, acknowledges it and hands it to the listener.
    /// A corrupt frame is answered with NAK and the read retried, up to
    /// [`MAX_RETRIES`] attempts.
    pub async fn listen(&mut self, listener: &mut MessageHandler<'_>) -> Result<()> {
        for _ in 0..MAX_RETRIES {
            match self.tcv.receive_message().await {
                Ok(message) => {
                    self.check_contract(listener, &message.data)?;
                    self.tcv.send_ack().await?;
                    listener.invoke(&message.data)?;
                    return Ok(());
                }
                Err(Smart3Error::PacketValidation(reason)) => {
                    log::debug!("listen: corrupt frame ({reason}), requesting retransmission");
                    self.tcv.send_nak().await?;
                }
                Err(other) => return Err(other),
            }
        }
        Err(Smart3Error::Protocol("read retry timeout exceeded".into()))
    }

    /// Receives a message and answers it with the handler's reply through
    /// the acknowledged send loop.
    pub async fn answer(&mut self, answerer: &mut MessageHandler<'_>) -> Result<()> {
        let message = self.tcv.receive_message().await?;
        self.check_contract(answerer, &message.data)?;
        match answerer.invoke(&message.data)? {
            Some(reply) => self.send_reply(reply).await,
            None => self.tcv.send_ack().await,
        }
    }

    /// Receives a message and dispatches it to the first handler whose
    /// contract accepts its type. Returns the handled message type.
    pub async fn answer_any(&mut self, answerers: &mut [MessageHandler<'_>]) -> Result<String> {
        let message = self.tcv.receive_message().await?;
        let message_type = message
            .data
            .message_type()
            .ok_or_else(|| {
                Smart3Error::ProtocolContract(format!(
                    "message {:?} carries no type tag",
                    message.data.as_str()
                ))
            })?
            .to_string();
        let answerer = answerers
            .iter_mut()
            .find(|h| h.accepts(&message_type))
            .ok_or_else(|| {
                Smart3Error::ProtocolContract(format!(
                    "no handler accepts message type {message_type}"
                ))
            })?;
        match answerer.invoke(&message.data)? {
            Some(reply) => self.send_reply(reply).await?,
            None => self.tcv.send_ack().await?,
        }
        Ok(message_type)
    }

    /// Transmits a broadcast frame.
    pub async fn broadcast(&mut self, payload: &[u8]) -> Result<()> {
        self.tcv.broadcast_sequence(payload).await
    }

    /// Receives one message and drops it without acknowledging.
    pub async fn swallow(&mut self) -> Result<()> {
        self.tcv.receive_message().await.map(|_| ())
    }

    /// The acknowledged send loop: transmit, then read indicators until the
    /// register settles the exchange. NAK retransmits (bounded), SYN and
    /// BEL keep the wait alive, CAN refuses the request.
    async fn send_reply(&mut self, reply: MessageData) -> Result<()> {
        self.tcv.send_message(reply.clone()).await?;
        let mut transmits = 1u32;
        loop {
            let indicator = self.tcv.receive_indicator().await?;
            match indicator.control {
                ACK => return Ok(()),
                NAK => {
                    if transmits > MAX_RETRIES {
                        return Err(Smart3Error::Protocol(
                            "write retry timeout exceeded".into(),
                        ));
                    }
                    log::debug!("send: NAK received, retransmitting (attempt {transmits})");
                    self.tcv.send_message(reply.clone()).await?;
                    transmits += 1;
                }
                SYN | BEL => {
                    // Register busy or out of paper; keep waiting without
                    // retransmitting.
                    continue;
                }
                CAN => return Err(Smart3Error::RequestRefused),
                other => {
                    return Err(Smart3Error::Protocol(format!(
                        "invalid control byte 0x{other:02X}"
                    )))
                }
            }
        }
    }

    fn check_contract(&self, handler: &MessageHandler<'_>, data: &MessageData) -> Result<()> {
        let message_type = data.message_type().ok_or_else(|| {
            Smart3Error::ProtocolContract(format!(
                "message {:?} carries no type tag",
                data.as_str()
            ))
        })?;
        if !handler.accepts(message_type) {
            return Err(Smart3Error::ProtocolContract(format!(
                "handler does not accept message type {message_type}"
            )));
        }
        Ok(())
    }
}
