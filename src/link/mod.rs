//! Link protocol state machines
//!
//! Both halves of the synchronization protocol live here:
//! - [`Responder`]: the device side. Probes for the host, requests the
//!   session snapshot, receives icons, then applies incremental diffs.
//! - [`HostLink`]: the host side. Answers the probe, pushes the snapshot and
//!   icons, then streams diffs and relays control commands.
//!
//! Both are poll-driven and never block; every wait is a deadline checked on
//! the next poll. Either half can be exercised against the other over a
//! [`MockTransport`](crate::transport::MockTransport) pair.

mod icon;
mod initiator;
mod responder;
mod state;

pub use icon::{IconReceiver, IconSender};
pub use initiator::{AudioController, AudioEnumerator, HostLink};
pub use responder::Responder;
pub use state::LinkState;
