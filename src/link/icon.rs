//! Icon transfer subprotocol
//!
//! One bitmap in flight at a time, both directions enforce it. Sequence:
//!
//! ```text
//! sender                          receiver
//!   icon_data{app}          -->
//!                           <--   ready_for_icon{app}
//!   icon_data_b64{app,data} -->
//!                           <--   icon_parsed{app,status}
//! ```
//!
//! The sender must not announce the next bitmap until `icon_parsed` (or a
//! timeout) is observed; that is the flow control protecting the constrained
//! receiver's buffer. A failed transfer is retried a bounded number of times
//! and then skipped; a missing icon is non-fatal.

use crate::config::Timings;
use crate::error::{Error, Result};
use crate::store::SessionTable;
use crate::wire::{IconStatus, Message, ICON_BYTE_SIZE};
use base64::Engine;
use std::collections::{HashSet, VecDeque};
use std::time::Instant;

fn b64() -> base64::engine::general_purpose::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// Device-side receiver: validates announcements and stores bitmaps
///
/// Tracks at most one pending transfer. Announcements for unknown apps,
/// already-iconed apps, or while another transfer is pending are ignored.
#[derive(Debug, Default)]
pub struct IconReceiver {
    pending: Option<String>,
}

impl IconReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// App the receiver is currently waiting a payload for
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Invalidate any pending transfer (disconnect, session reset)
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Handle `icon_data{app}`; replies `ready_for_icon` when the transfer
    /// is acceptable
    pub fn handle_announce(&mut self, table: &SessionTable, app: &str) -> Option<Message> {
        if let Some(pending) = &self.pending {
            log::info!(
                "Icon transfer for {} already pending, ignoring announce for {}",
                pending,
                app
            );
            return None;
        }
        let Some(session) = table.get(app) else {
            log::warn!("Icon announced for unknown app: {}", app);
            return None;
        };
        if session.icon.is_some() {
            log::info!("Already have icon for {}, ignoring announce", app);
            return None;
        }

        self.pending = Some(app.to_string());
        Some(Message::ReadyForIcon {
            app: app.to_string(),
        })
    }

    /// Handle `icon_data_b64`; replies `icon_parsed` with the verdict
    ///
    /// Payloads whose app tag no longer matches the pending transfer are
    /// late arrivals from a prior session and are dropped silently.
    pub fn handle_b64(&mut self, table: &mut SessionTable, app: &str, data: &str) -> Option<Message> {
        if self.pending.as_deref() != Some(app) {
            log::warn!(
                "Icon payload for {} does not match pending transfer ({:?}), ignoring",
                app,
                self.pending
            );
            return None;
        }
        self.pending = None;

        let verdict = b64()
            .decode(data.trim())
            .map_err(|e| Error::MalformedMessage(format!("icon base64: {}", e)))
            .and_then(|bytes| table.apply_icon(app, bytes));

        Some(Self::verdict_message(app, verdict))
    }

    /// Handle a marker-framed payload from the deprecated framing
    ///
    /// The legacy host sent base64 text between markers, so either exactly
    /// [`ICON_BYTE_SIZE`] raw bytes or a base64 string of them is accepted.
    pub fn handle_payload(
        &mut self,
        table: &mut SessionTable,
        app: &str,
        bytes: Vec<u8>,
    ) -> Option<Message> {
        if self.pending.as_deref() != Some(app) {
            log::warn!("Marker payload for {} with no matching pending transfer, ignoring", app);
            return None;
        }
        self.pending = None;

        let decoded = if bytes.len() == ICON_BYTE_SIZE {
            Ok(bytes)
        } else {
            std::str::from_utf8(&bytes)
                .map_err(|_| Error::MalformedMessage("icon payload is neither raw nor base64".into()))
                .and_then(|text| {
                    b64().decode(text.trim())
                        .map_err(|e| Error::MalformedMessage(format!("icon base64: {}", e)))
                })
        };
        let verdict = decoded.and_then(|raw| table.apply_icon(app, raw));

        Some(Self::verdict_message(app, verdict))
    }

    fn verdict_message(app: &str, verdict: Result<()>) -> Message {
        match verdict {
            Ok(()) => Message::icon_ok(app),
            Err(e) => {
                log::warn!("Icon rejected for {}: {}", app, e);
                Message::icon_error(app, e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SendPhase {
    /// Nothing announced
    Idle,
    /// `icon_data` sent, awaiting `ready_for_icon`
    AwaitReady { deadline: Instant },
    /// `icon_data_b64` sent, awaiting `icon_parsed`
    AwaitParsed { deadline: Instant },
}

struct Transfer {
    app: String,
    bytes: Vec<u8>,
    attempts: u32,
}

/// Host-side sender: drives one transfer at a time through announce/ack
pub struct IconSender {
    queue: VecDeque<Transfer>,
    current: Option<Transfer>,
    phase: SendPhase,
    sent: HashSet<String>,
    /// Set after a failed attempt; no new announce until it passes
    blocked_until: Option<Instant>,
    timings: Timings,
}

impl IconSender {
    pub fn new(timings: Timings) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            phase: SendPhase::Idle,
            sent: HashSet::new(),
            blocked_until: None,
            timings,
        }
    }

    /// Queue a bitmap for transfer; duplicates of already-sent or queued
    /// apps are dropped
    pub fn enqueue(&mut self, app: &str, bytes: Vec<u8>) {
        if self.sent.contains(app)
            || self.queue.iter().any(|t| t.app == app)
            || self.current.as_ref().is_some_and(|t| t.app == app)
        {
            log::debug!("Icon for {} already sent or queued, skipping", app);
            return;
        }
        self.queue.push_back(Transfer {
            app: app.to_string(),
            bytes,
            attempts: 0,
        });
    }

    /// True when nothing is queued or in flight
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.current.is_none()
    }

    /// Apps successfully transferred this session
    pub fn sent(&self) -> &HashSet<String> {
        &self.sent
    }

    /// Drop all transfer state, including the dedup set (disconnect reset)
    pub fn reset(&mut self) {
        self.queue.clear();
        self.current = None;
        self.phase = SendPhase::Idle;
        self.sent.clear();
        self.blocked_until = None;
    }

    /// Advance: start the next transfer or expire the current one
    pub fn poll(&mut self, now: Instant) -> Vec<Message> {
        match self.phase {
            SendPhase::Idle => {
                if self.blocked_until.is_some_and(|t| now < t) {
                    return Vec::new();
                }
                self.blocked_until = None;
                self.start_next(now)
            }
            SendPhase::AwaitReady { deadline } | SendPhase::AwaitParsed { deadline } => {
                if now >= deadline {
                    log::warn!(
                        "Icon transfer timed out for {:?}",
                        self.current.as_ref().map(|t| t.app.as_str())
                    );
                    self.retry_or_skip(now)
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Feed an inbound subprotocol message
    pub fn handle_message(&mut self, msg: &Message, now: Instant) -> Vec<Message> {
        match msg {
            Message::ReadyForIcon { app } => {
                let matches = matches!(self.phase, SendPhase::AwaitReady { .. })
                    && self.current.as_ref().is_some_and(|t| &t.app == app);
                if !matches {
                    log::warn!("Unexpected ready_for_icon for {}, ignoring", app);
                    return Vec::new();
                }
                let transfer = self.current.as_ref().map(|t| Message::IconDataB64 {
                    app: t.app.clone(),
                    data: b64().encode(&t.bytes),
                });
                self.phase = SendPhase::AwaitParsed {
                    deadline: now + self.timings.step_timeout,
                };
                transfer.into_iter().collect()
            }
            Message::IconParsed { app, status, error } => {
                let matches = matches!(self.phase, SendPhase::AwaitParsed { .. })
                    && self.current.as_ref().is_some_and(|t| &t.app == app);
                if !matches {
                    log::warn!("Unexpected icon_parsed for {}, ignoring", app);
                    return Vec::new();
                }
                match status {
                    IconStatus::Ok => {
                        log::info!("Icon transferred: {}", app);
                        self.sent.insert(app.clone());
                        self.current = None;
                        self.phase = SendPhase::Idle;
                        // Chain straight into the next queued transfer.
                        self.start_next(now)
                    }
                    IconStatus::Error => {
                        log::warn!(
                            "Receiver rejected icon for {}: {}",
                            app,
                            error.as_deref().unwrap_or("unspecified")
                        );
                        self.retry_or_skip(now)
                    }
                }
            }
            _ => Vec::new(),
        }
    }

    fn start_next(&mut self, now: Instant) -> Vec<Message> {
        if self.current.is_none() {
            self.current = self.queue.pop_front();
        }
        let Some(transfer) = &self.current else {
            return Vec::new();
        };
        self.phase = SendPhase::AwaitReady {
            deadline: now + self.timings.step_timeout,
        };
        vec![Message::IconData {
            app: transfer.app.clone(),
        }]
    }

    fn retry_or_skip(&mut self, now: Instant) -> Vec<Message> {
        self.phase = SendPhase::Idle;
        let Some(mut transfer) = self.current.take() else {
            return Vec::new();
        };
        transfer.attempts += 1;
        if transfer.attempts > self.timings.icon_retry_limit {
            log::warn!(
                "Giving up on icon for {} after {} attempts (app stays usable without it)",
                transfer.app,
                transfer.attempts
            );
            // Marked sent so steady-state polling does not re-queue it.
            self.sent.insert(transfer.app);
        } else {
            log::info!(
                "Retrying icon for {} (attempt {})",
                transfer.app,
                transfer.attempts + 1
            );
            self.current = Some(transfer);
            self.blocked_until = Some(now + self.timings.retry_backoff);
        }
        Vec::new()
    }
}
