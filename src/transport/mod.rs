//! Transport layer for I/O abstraction

use crate::error::Result;

mod mock;
mod paced;
mod serial;

pub use mock::MockTransport;
pub use paced::PacedWriter;
pub use serial::SerialTransport;

/// Transport trait for link communication
///
/// Reads must never block: a transport with nothing to deliver returns
/// `Ok(0)`. Writes may block only up to the transport's own bounded timeout.
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 = nothing
    /// available right now)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }

    /// Write an entire buffer, retrying partial writes
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            written += self.write(&data[written..])?;
        }
        Ok(())
    }
}
