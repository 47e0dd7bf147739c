//! MixLink - Audio session mirroring over a serial deck link
//!
//! Keeps a hardware volume deck in sync with the host's per-application
//! audio sessions: names, volumes, mute flags, and 48x48 RGB565 icons.
//! Messages are newline-delimited JSON over any byte transport; icons move
//! through a single-outstanding announce/ready/data/verdict subprotocol.
//!
//! The crate carries both ends of the link. [`link::Responder`] is the
//! device side (runs inside [`app::DeckApp`]); [`link::HostLink`] is the
//! host side, generic over an audio backend. Both are poll-driven and
//! sans-IO, so the protocol logic tests without threads or timers.

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod media;
pub mod store;
pub mod transport;
pub mod wire;

pub use app::DeckApp;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use link::{HostLink, LinkState, Responder};
pub use store::SessionTable;
pub use transport::Transport;
pub use wire::{FrameCodec, Message};
