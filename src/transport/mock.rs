//! Mock transport for testing

use super::Transport;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Mock transport for unit testing
///
/// A standalone mock echoes nothing: injected bytes are read back, writes
/// accumulate for inspection. [`MockTransport::pair`] cross-connects two
/// ends so a responder and an initiator can talk over an in-memory wire.
#[derive(Clone)]
pub struct MockTransport {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<VecDeque<u8>>>,
    /// Next read fails when set (simulated link loss)
    fail_reads: Arc<Mutex<bool>>,
}

impl MockTransport {
    /// Create a standalone mock transport
    pub fn new() -> Self {
        MockTransport {
            rx: Arc::new(Mutex::new(VecDeque::new())),
            tx: Arc::new(Mutex::new(VecDeque::new())),
            fail_reads: Arc::new(Mutex::new(false)),
        }
    }

    /// Create two cross-connected ends of an in-memory wire
    ///
    /// Bytes written to one end become readable on the other.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a = Arc::new(Mutex::new(VecDeque::new()));
        let a = MockTransport {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
            fail_reads: Arc::new(Mutex::new(false)),
        };
        let b = MockTransport {
            rx: a_to_b,
            tx: b_to_a,
            fail_reads: Arc::new(Mutex::new(false)),
        };
        (a, b)
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.rx.lock().extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.tx.lock().iter().copied().collect()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.tx.lock().clear();
    }

    /// Make subsequent reads fail with an I/O error
    pub fn fail_next_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if *self.fail_reads.lock() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock link down",
            )
            .into());
        }
        let mut rx = self.rx.lock();
        let available = rx.len().min(buffer.len());
        for item in buffer.iter_mut().take(available) {
            *item = rx.pop_front().unwrap_or(0);
        }
        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.tx.lock().extend(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.rx.lock().len())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
