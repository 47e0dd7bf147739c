//! Media key channel
//!
//! Media keys bypass the session protocol entirely: a press is forwarded as
//! a consumer-control report over its own channel and never acked. Losing
//! one press is acceptable; delaying volume sync behind it is not, which is
//! why this path shares nothing with the deck link.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Consumer-control keys the deck can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    Mute,
    VolumeUp,
    VolumeDown,
    PlayPause,
    Next,
    Previous,
}

impl MediaKey {
    /// Bit in the consumer-control report
    pub fn report_bit(self) -> u8 {
        match self {
            MediaKey::Mute => 0b0000_0001,
            MediaKey::VolumeUp => 0b0000_0010,
            MediaKey::VolumeDown => 0b0000_0100,
            MediaKey::PlayPause => 0b0000_1000,
            MediaKey::Next => 0b0001_0000,
            MediaKey::Previous => 0b0010_0000,
        }
    }
}

/// Where media key reports end up (USB HID endpoint, OS injector, test spy)
pub trait MediaKeySink {
    /// Emit one press/release cycle for `key`
    fn send_key(&mut self, key: MediaKey) -> crate::error::Result<()>;
}

/// Sink that accepts every key and does nothing with it
///
/// Stands in until a consumer-control endpoint binding is wired into the
/// daemon; keys still flow through the channel and get logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MediaKeySink for NullSink {
    fn send_key(&mut self, _key: MediaKey) -> crate::error::Result<()> {
        Ok(())
    }
}

/// Channel pair connecting input handling to the sink worker
pub fn media_channel() -> (Sender<MediaKey>, Receiver<MediaKey>) {
    unbounded()
}

/// Drain the channel into the sink until all senders hang up
///
/// Sink errors are logged and dropped; the worker never takes the link down
/// over a lost key press.
pub fn run_sink<S: MediaKeySink>(rx: Receiver<MediaKey>, mut sink: S) {
    for key in rx.iter() {
        log::debug!("Media key: {:?}", key);
        if let Err(e) = sink.send_key(key) {
            log::warn!("Media key {:?} dropped: {}", key, e);
        }
    }
    log::debug!("Media key channel closed");
}
