//! Wire format for the deck link
//!
//! # Link Protocol
//!
//! Every message is one JSON object terminated by `\n`, carrying a `type`
//! discriminator:
//!
//! ```text
//! {"type":"initial_config","data":[{"name":"Chrome","volume":50,...}]}\n
//! ```
//!
//! Icon bitmaps travel as base64 inside an `icon_data_b64` message (the
//! canonical framing). A deprecated framing wrapped the raw payload in
//! `<ICON_START>` / `<ICON_END>` markers directly on the byte stream; the
//! decoder still accepts it, the encoder never produces it.
//!
//! ## Icon byte layout
//!
//! Raw RGB565, big-endian per pixel, row-major, fixed 48x48 = 4608 bytes.
//! An icon is attached whole or not at all; partial icons never reach the
//! session table.

pub mod codec;
pub mod messages;

pub use codec::{Decoded, FrameCodec};
pub use messages::{AppChanges, AppEntry, IconStatus, Message};

/// Icon bitmap width in pixels
pub const ICON_WIDTH: usize = 48;

/// Icon bitmap height in pixels
pub const ICON_HEIGHT: usize = 48;

/// Bytes per RGB565 pixel
pub const ICON_BYTES_PER_PIXEL: usize = 2;

/// Exact byte length of one icon bitmap (48 * 48 * 2)
pub const ICON_BYTE_SIZE: usize = ICON_WIDTH * ICON_HEIGHT * ICON_BYTES_PER_PIXEL;

/// Deprecated marker framing: payload start
pub const ICON_START_MARKER: &[u8] = b"<ICON_START>";

/// Deprecated marker framing: payload end
pub const ICON_END_MARKER: &[u8] = b"<ICON_END>";

/// Cap on the JSON line accumulator
///
/// Must hold one base64 icon line: 4608 bytes encode to 6144 base64 chars
/// plus the JSON envelope.
pub const LINE_BUFFER_CAP: usize = 8192;

/// Cap on the marker-framed icon accumulator (base64 text of one icon plus
/// margin)
pub const ICON_BUFFER_CAP: usize = ICON_BYTE_SIZE * 2;
