//! Incremental frame decoder for the deck link
//!
//! Turns an arbitrarily chunked byte stream into discrete frames. The decoder
//! consumes input byte by byte, so the decoded sequence is identical no
//! matter where the transport splits its reads (streaming invariance).
//!
//! Two states:
//! - **Scanning**: accumulate until `\n`, then parse one JSON message. A
//!   `<ICON_START>` marker instead of a newline switches to icon reception
//!   (deprecated framing, decode-only).
//! - **ReceivingIcon**: accumulate until `<ICON_END>`, then emit the raw
//!   payload tagged with the app name announced by the preceding `icon_data`
//!   message.
//!
//! Both accumulators are capped; exceeding a cap discards the buffer and
//! resumes scanning so a corrupt burst can never grow memory unbounded.
//! Malformed JSON is counted and dropped, never fatal.

use super::messages::Message;
use super::{ICON_BUFFER_CAP, ICON_END_MARKER, ICON_START_MARKER, LINE_BUFFER_CAP};
use std::collections::VecDeque;

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A complete JSON message
    Message(Message),
    /// A marker-framed icon payload (deprecated framing)
    IconPayload { app: String, data: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Scanning,
    ReceivingIcon,
}

/// Streaming frame decoder
pub struct FrameCodec {
    input: VecDeque<u8>,
    state: ScanState,
    line: Vec<u8>,
    icon: Vec<u8>,
    /// App named by the last `icon_data` message; tags a following
    /// marker-framed payload
    announced_app: Option<String>,
    malformed: u64,
    overflows: u64,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            input: VecDeque::new(),
            state: ScanState::Scanning,
            line: Vec::new(),
            icon: Vec::new(),
            announced_app: None,
            malformed: 0,
            overflows: 0,
        }
    }

    /// Append raw transport bytes
    pub fn feed(&mut self, chunk: &[u8]) {
        self.input.extend(chunk);
    }

    /// Decode the next complete frame, if the buffered bytes contain one
    pub fn poll(&mut self) -> Option<Decoded> {
        while let Some(byte) = self.input.pop_front() {
            if let Some(frame) = self.push_byte(byte) {
                return Some(frame);
            }
        }
        None
    }

    /// Drop all accumulation state (used on disconnect so nothing leaks into
    /// the next session)
    pub fn reset(&mut self) {
        self.input.clear();
        self.line.clear();
        self.icon.clear();
        self.announced_app = None;
        self.state = ScanState::Scanning;
    }

    /// Count of malformed JSON lines dropped so far
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// Count of buffer-cap overflows so far
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    fn push_byte(&mut self, byte: u8) -> Option<Decoded> {
        match self.state {
            ScanState::Scanning => self.scan_byte(byte),
            ScanState::ReceivingIcon => self.icon_byte(byte),
        }
    }

    fn scan_byte(&mut self, byte: u8) -> Option<Decoded> {
        if byte == b'\n' {
            let line = std::mem::take(&mut self.line);
            return self.finish_line(&line);
        }

        self.line.push(byte);

        if self.line.ends_with(ICON_START_MARKER) {
            let preamble = self.line.len() - ICON_START_MARKER.len();
            if preamble > 0 {
                log::debug!("Discarding {} bytes before icon start marker", preamble);
            }
            self.line.clear();
            self.icon.clear();
            self.state = ScanState::ReceivingIcon;
            return None;
        }

        if self.line.len() > LINE_BUFFER_CAP {
            log::warn!(
                "Line buffer exceeded {} bytes without terminator, discarding",
                LINE_BUFFER_CAP
            );
            self.line.clear();
            self.overflows += 1;
        }
        None
    }

    fn finish_line(&mut self, line: &[u8]) -> Option<Decoded> {
        let trimmed = trim_ascii(line);
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_slice::<Message>(trimmed) {
            Ok(msg) => {
                // Remember the announced app so a legacy marker payload can
                // be tagged; any other message invalidates the announcement.
                match &msg {
                    Message::IconData { app } => self.announced_app = Some(app.clone()),
                    _ => self.announced_app = None,
                }
                Some(Decoded::Message(msg))
            }
            Err(e) => {
                self.malformed += 1;
                log::warn!(
                    "Dropping malformed message ({}): {:?}",
                    e,
                    String::from_utf8_lossy(&trimmed[..trimmed.len().min(80)])
                );
                None
            }
        }
    }

    fn icon_byte(&mut self, byte: u8) -> Option<Decoded> {
        self.icon.push(byte);

        if self.icon.ends_with(ICON_END_MARKER) {
            let payload_len = self.icon.len() - ICON_END_MARKER.len();
            let data = self.icon[..payload_len].to_vec();
            self.icon.clear();
            self.state = ScanState::Scanning;

            return match self.announced_app.take() {
                Some(app) => Some(Decoded::IconPayload { app, data }),
                None => {
                    self.malformed += 1;
                    log::warn!("Icon payload with no announced app, dropping {} bytes", payload_len);
                    None
                }
            };
        }

        if self.icon.len() > ICON_BUFFER_CAP {
            log::warn!(
                "Icon buffer exceeded {} bytes without end marker, discarding",
                ICON_BUFFER_CAP
            );
            self.icon.clear();
            self.announced_app = None;
            self.state = ScanState::Scanning;
            self.overflows += 1;
        }
        None
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip leading/trailing ASCII whitespace (CRLF links, REPL echo padding)
fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut FrameCodec) -> Vec<Decoded> {
        let mut out = Vec::new();
        while let Some(frame) = codec.poll() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_single_message() {
        let mut codec = FrameCodec::new();
        codec.feed(b"{\"type\":\"test\"}\n");
        assert_eq!(drain(&mut codec), vec![Decoded::Message(Message::Test)]);
    }

    #[test]
    fn test_crlf_line() {
        let mut codec = FrameCodec::new();
        codec.feed(b"{\"type\":\"test\"}\r\n");
        assert_eq!(drain(&mut codec), vec![Decoded::Message(Message::Test)]);
    }

    #[test]
    fn test_incomplete_then_complete() {
        let mut codec = FrameCodec::new();
        codec.feed(b"{\"type\":");
        assert_eq!(codec.poll(), None);
        codec.feed(b"\"test\"}\n");
        assert_eq!(codec.poll(), Some(Decoded::Message(Message::Test)));
    }

    #[test]
    fn test_streaming_invariance() {
        let stream: Vec<u8> = [
            b"{\"type\":\"test\"}\n".as_slice(),
            b"{\"type\":\"icon_data\",\"app\":\"Chrome\"}\n",
            ICON_START_MARKER,
            b"RAWDATA",
            ICON_END_MARKER,
            b"{\"type\":\"ready\"}\n",
        ]
        .concat();

        // Whole-stream reference
        let mut whole = FrameCodec::new();
        whole.feed(&stream);
        let expect = drain(&mut whole);
        assert_eq!(expect.len(), 4);
        assert_eq!(
            expect[2],
            Decoded::IconPayload {
                app: "Chrome".to_string(),
                data: b"RAWDATA".to_vec()
            }
        );

        // Byte-at-a-time must match
        let mut single = FrameCodec::new();
        let mut got = Vec::new();
        for b in &stream {
            single.feed(&[*b]);
            while let Some(frame) = single.poll() {
                got.push(frame);
            }
        }
        assert_eq!(got, expect);

        // A few uneven split points must match too
        for split in [1, 7, 20, stream.len() - 3] {
            let mut codec = FrameCodec::new();
            codec.feed(&stream[..split]);
            let mut got = drain(&mut codec);
            codec.feed(&stream[split..]);
            got.extend(drain(&mut codec));
            assert_eq!(got, expect, "split at {}", split);
        }
    }

    #[test]
    fn test_marker_payload_tagged_with_announced_app() {
        let mut codec = FrameCodec::new();
        codec.feed(b"{\"type\":\"icon_data\",\"app\":\"Spotify\"}\n");
        codec.feed(ICON_START_MARKER);
        codec.feed(&[0xAB; 16]);
        codec.feed(ICON_END_MARKER);

        let frames = drain(&mut codec);
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1],
            Decoded::IconPayload {
                app: "Spotify".to_string(),
                data: vec![0xAB; 16],
            }
        );
    }

    #[test]
    fn test_payload_without_announcement_dropped() {
        let mut codec = FrameCodec::new();
        codec.feed(ICON_START_MARKER);
        codec.feed(b"orphan");
        codec.feed(ICON_END_MARKER);
        codec.feed(b"{\"type\":\"test\"}\n");

        // Orphan payload dropped, scanning resumes cleanly.
        assert_eq!(drain(&mut codec), vec![Decoded::Message(Message::Test)]);
        assert_eq!(codec.malformed_count(), 1);
    }

    #[test]
    fn test_malformed_json_dropped_not_fatal() {
        let mut codec = FrameCodec::new();
        codec.feed(b"{not json\n{\"type\":\"test\"}\n");
        assert_eq!(drain(&mut codec), vec![Decoded::Message(Message::Test)]);
        assert_eq!(codec.malformed_count(), 1);
    }

    #[test]
    fn test_line_cap_recovery() {
        let mut codec = FrameCodec::new();
        codec.feed(&vec![b'x'; LINE_BUFFER_CAP + 10]);
        codec.feed(b"\n{\"type\":\"test\"}\n");

        // The oversized garbage line is discarded; what remains of it up to
        // its newline parses as malformed, then decoding resumes.
        let frames = drain(&mut codec);
        assert_eq!(frames, vec![Decoded::Message(Message::Test)]);
        assert_eq!(codec.overflow_count(), 1);
    }

    #[test]
    fn test_icon_cap_recovery() {
        let mut codec = FrameCodec::new();
        codec.feed(b"{\"type\":\"icon_data\",\"app\":\"Chrome\"}\n");
        assert!(codec.poll().is_some());
        codec.feed(ICON_START_MARKER);
        codec.feed(&vec![0u8; ICON_BUFFER_CAP + 1]);
        codec.feed(b"{\"type\":\"test\"}\n");

        assert_eq!(drain(&mut codec), vec![Decoded::Message(Message::Test)]);
        assert_eq!(codec.overflow_count(), 1);
    }

    #[test]
    fn test_reset_clears_partial_state() {
        let mut codec = FrameCodec::new();
        codec.feed(b"{\"type\":\"icon_data\",\"app\":\"Chrome\"}\n");
        assert!(codec.poll().is_some());
        codec.feed(ICON_START_MARKER);
        codec.feed(&[1, 2, 3]);

        codec.reset();
        codec.feed(b"{\"type\":\"test\"}\n");
        assert_eq!(drain(&mut codec), vec![Decoded::Message(Message::Test)]);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let mut codec = FrameCodec::new();
        codec.feed(b"\n\r\n{\"type\":\"test\"}\n\n");
        assert_eq!(drain(&mut codec), vec![Decoded::Message(Message::Test)]);
        assert_eq!(codec.malformed_count(), 0);
    }
}
