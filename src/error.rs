//! Error types for MixLink

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// MixLink error types
///
/// The split matters for recovery policy: transport errors tear the whole
/// link down, per-icon errors retry or skip, everything else is logged and
/// the loop keeps running.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration write error
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// A protocol step exceeded its bounded wait
    #[error("Timeout waiting for {0}")]
    Timeout(&'static str),

    /// Message was valid but arrived in the wrong link state
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Bad JSON or missing field; dropped and counted, never fatal
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Icon payload length did not match the fixed bitmap size
    #[error("Icon size mismatch: expected {expected} bytes, got {actual}")]
    IconSizeMismatch {
        /// Required payload length
        expected: usize,
        /// Received payload length
        actual: usize,
    },

    /// Accumulation buffer exceeded its cap without a terminator
    #[error("Buffer overflow: cap {0} bytes exceeded")]
    BufferOverflow(usize),

    /// Message referenced an app the session table does not know
    #[error("Unknown app: {0}")]
    UnknownApp(String),

    /// Link is down; pending subprotocol state was invalidated
    #[error("Disconnected")]
    Disconnected,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
