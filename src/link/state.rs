//! Link state definitions

use std::fmt;

/// Phase of the synchronization protocol
///
/// Any transport failure, from any state, drops to `Disconnected`, which
/// resets the protocol session and the session table. `Error` is only
/// reached after repeated transport failures and is externally visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link activity; the device probes from here
    Idle,
    /// Liveness probe sent, awaiting the reply
    Handshaking,
    /// Awaiting / serving the full session snapshot
    ConfigExchange,
    /// Icon transfers in flight; gated on the expected count
    IconSync,
    /// Fully synced; only diffs and commands flow
    SteadyState,
    /// Transport failed; session state has been reset
    Disconnected,
    /// Repeated transport failures; the loop has given up
    Error,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "idle",
            LinkState::Handshaking => "handshaking",
            LinkState::ConfigExchange => "config_exchange",
            LinkState::IconSync => "icon_sync",
            LinkState::SteadyState => "steady_state",
            LinkState::Disconnected => "disconnected",
            LinkState::Error => "error",
        };
        f.write_str(name)
    }
}
