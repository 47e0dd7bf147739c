//! Write pacing for slow links
//!
//! A base64 icon line is ~6.2 KiB; pushed in one burst it can overrun the
//! UART receive buffer on a small device. [`PacedWriter`] wraps any
//! transport and splits large writes into fixed-size chunks with a delay
//! between them. Reads pass straight through.

use super::Transport;
use crate::error::Result;
use std::time::Duration;

/// Transport wrapper that chunks and paces outbound writes
pub struct PacedWriter<T: Transport> {
    inner: T,
    chunk_len: usize,
    delay: Duration,
}

impl<T: Transport> PacedWriter<T> {
    pub fn new(inner: T, chunk_len: usize, delay: Duration) -> Self {
        Self {
            inner,
            chunk_len: chunk_len.max(1),
            delay,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for PacedWriter<T> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.inner.read(buffer)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.inner.write(data)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn available(&mut self) -> Result<usize> {
        self.inner.available()
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut chunks = data.chunks(self.chunk_len).peekable();
        while let Some(chunk) = chunks.next() {
            self.inner.write_all(chunk)?;
            self.inner.flush()?;
            if chunks.peek().is_some() && !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }
        Ok(())
    }
}
