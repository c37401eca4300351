//! Mock serial port for testing.
//!
//! Simulates the register side of the link without hardware: tests queue
//! the bytes the register would send and inspect the bytes the host wrote.
//! Clones share the same buffers, so a test can keep a handle while the
//! driver owns another.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::smart3::serial::SerialLink;

/// In-memory stand-in for the OS serial device.
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Bytes the host has written (outgoing).
    tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Bytes queued for the host to read (incoming).
    rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Error returned by the next read or write.
    next_error: Arc<Mutex<Option<io::Error>>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        MockSerialPort::default()
    }

    /// Queues register-side bytes for the host to read.
    pub fn queue_bytes(&self, data: &[u8]) {
        self.rx_buffer.lock().unwrap().extend(data);
    }

    /// Everything the host has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Number of queued bytes the host has not read yet.
    pub fn unread(&self) -> usize {
        self.rx_buffer.lock().unwrap().len()
    }

    /// Clears both directions.
    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_buffer.lock().unwrap().clear();
    }

    /// Arms an error for the next I/O operation.
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }
        let mut rx = self.rx_buffer.lock().unwrap();
        let available = rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = rx.drain(..available).collect();
            buf.put_slice(&data);
        }
        // An empty queue completes with zero bytes; the driver backs off
        // and retries until its deadline.
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }
        self.tx_buffer.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl SerialLink for MockSerialPort {
    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(self.rx_buffer.lock().unwrap().len() as u32)
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        Ok(0)
    }

    fn discard_in_buffer(&self) -> io::Result<()> {
        self.rx_buffer.lock().unwrap().clear();
        Ok(())
    }

    fn discard_out_buffer(&self) -> io::Result<()> {
        Ok(())
    }

    async fn flush_link(&mut self) -> io::Result<()> {
        Ok(())
    }
}
