//! Host-side link driver
//!
//! Answers the device's probe, serves the initial snapshot, pushes icons
//! through [`IconSender`], then mirrors audio changes as incremental diffs
//! and executes inbound volume and mute commands.
//!
//! The audio system is behind two traits so the protocol logic tests
//! against an in-memory fake; production wires in a platform mixer binding.

use super::icon::IconSender;
use super::state::LinkState;
use crate::config::Timings;
use crate::error::Result;
use crate::store::diff;
use crate::wire::{AppEntry, Message};
use std::time::Instant;

/// Read access to the audio session list
pub trait AudioEnumerator {
    /// Current snapshot of active sessions
    fn snapshot(&mut self) -> Result<Vec<AppEntry>>;
    /// RGB565 bitmap for one session, if it has one
    fn icon(&mut self, app: &str) -> Result<Option<Vec<u8>>>;
}

/// Write access to per-session volume and mute
pub trait AudioController {
    fn set_volume(&mut self, app: &str, volume: u8) -> Result<()>;
    fn toggle_mute(&mut self, app: &str) -> Result<()>;
}

/// Host-side protocol driver over an audio backend
pub struct HostLink<A> {
    audio: A,
    state: LinkState,
    sender: IconSender,
    /// Snapshot matching what the device has applied so far
    last_snapshot: Vec<AppEntry>,
    /// Bounded wait for the current step
    deadline: Option<Instant>,
    next_poll: Option<Instant>,
    init_sent: bool,
    timings: Timings,
    violations: u64,
}

impl<A: AudioEnumerator + AudioController> HostLink<A> {
    pub fn new(audio: A, timings: Timings) -> Self {
        Self {
            audio,
            state: LinkState::Idle,
            sender: IconSender::new(timings),
            last_snapshot: Vec::new(),
            deadline: None,
            next_poll: None,
            init_sent: false,
            timings,
            violations: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_steady(&self) -> bool {
        self.state == LinkState::SteadyState
    }

    pub fn violation_count(&self) -> u64 {
        self.violations
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    /// React to one decoded message from the device
    pub fn handle_message(&mut self, msg: &Message, now: Instant) -> Vec<Message> {
        match (self.state, msg) {
            // The probe restarts the session from any state. A device that
            // rebooted mid-session looks exactly like a fresh one.
            (_, Message::Test) => {
                if self.state != LinkState::Idle {
                    log::info!("Probe received in state {}, restarting session", self.state);
                }
                self.reset_session();
                self.transition(LinkState::Handshaking);
                self.arm_deadline(now);
                vec![Message::test_response_ok()]
            }

            (LinkState::Handshaking, Message::RequestInitialConfig) => {
                match self.audio.snapshot() {
                    Ok(snapshot) => {
                        log::info!("Serving initial config: {} sessions", snapshot.len());
                        self.last_snapshot = snapshot.clone();
                        self.transition(LinkState::ConfigExchange);
                        self.arm_deadline(now);
                        vec![Message::InitialConfig { data: snapshot }]
                    }
                    Err(e) => {
                        log::error!("Audio snapshot failed: {}", e);
                        vec![Message::Error {
                            message: format!("snapshot failed: {}", e),
                        }]
                    }
                }
            }

            (LinkState::ConfigExchange, Message::ConfigReceived { unique_apps, .. }) => {
                log::info!("Device acked config ({} unique apps)", unique_apps);
                self.transition(LinkState::IconSync);
                self.arm_deadline(now);
                self.enqueue_icons_for(&self.last_snapshot.clone());
                self.drive_icon_sync(now)
            }

            (
                LinkState::IconSync | LinkState::SteadyState,
                Message::ReadyForIcon { .. } | Message::IconParsed { .. },
            ) => {
                if self.state == LinkState::IconSync {
                    self.arm_deadline(now);
                }
                let mut out = self.sender.handle_message(msg, now);
                out.extend(self.maybe_send_init_complete());
                out
            }

            (LinkState::IconSync, Message::Ready) => {
                log::info!("Device ready, entering steady state");
                self.deadline = None;
                self.next_poll = Some(now + self.timings.poll_interval);
                self.transition(LinkState::SteadyState);
                Vec::new()
            }

            (LinkState::SteadyState, Message::SetVolume { app, volume }) => {
                match self.audio.set_volume(app, *volume) {
                    Ok(()) => {
                        log::debug!("Set {} volume to {}", app, volume);
                        // Reflect the command locally so the next poll does
                        // not echo it back as a diff.
                        if let Some(entry) =
                            self.last_snapshot.iter_mut().find(|e| &e.name == app)
                        {
                            entry.volume = *volume;
                        }
                        Vec::new()
                    }
                    Err(e) => {
                        log::warn!("set_volume({}, {}) failed: {}", app, volume, e);
                        vec![Message::Error {
                            message: format!("set_volume {} failed: {}", app, e),
                        }]
                    }
                }
            }

            (LinkState::SteadyState, Message::ToggleMute { app }) => {
                match self.audio.toggle_mute(app) {
                    Ok(()) => {
                        log::debug!("Toggled mute for {}", app);
                        if let Some(entry) =
                            self.last_snapshot.iter_mut().find(|e| &e.name == app)
                        {
                            entry.muted = !entry.muted;
                        }
                        Vec::new()
                    }
                    Err(e) => {
                        log::warn!("toggle_mute({}) failed: {}", app, e);
                        vec![Message::Error {
                            message: format!("toggle_mute {} failed: {}", app, e),
                        }]
                    }
                }
            }

            (_, Message::Error { message }) => {
                log::error!("Device reported error: {}", message);
                Vec::new()
            }

            (state, _) => {
                self.violations += 1;
                log::warn!("Ignoring unexpected message in state {}", state);
                Vec::new()
            }
        }
    }

    /// Advance time-driven behavior: expire the current step, run the
    /// steady-state audio poll, drive pending icon transfers
    pub fn poll(&mut self, now: Instant) -> Vec<Message> {
        match self.state {
            LinkState::Handshaking | LinkState::ConfigExchange => {
                if self.deadline.is_some_and(|d| now >= d) {
                    log::warn!("Device went quiet in state {}, back to idle", self.state);
                    self.reset_session();
                    self.transition(LinkState::Idle);
                }
                Vec::new()
            }
            LinkState::IconSync => {
                if self.deadline.is_some_and(|d| now >= d) {
                    log::warn!("Icon sync stalled, back to idle");
                    self.reset_session();
                    self.transition(LinkState::Idle);
                    return Vec::new();
                }
                self.drive_icon_sync(now)
            }
            LinkState::SteadyState => {
                let mut out = self.sender.poll(now);
                out.extend(self.poll_audio(now));
                out
            }
            _ => Vec::new(),
        }
    }

    /// One icon-sync turn: let the sender start or expire a transfer, then
    /// close the phase with `init_complete` once everything is through
    fn drive_icon_sync(&mut self, now: Instant) -> Vec<Message> {
        let mut out = self.sender.poll(now);
        out.extend(self.maybe_send_init_complete());
        out
    }

    fn maybe_send_init_complete(&mut self) -> Vec<Message> {
        if self.state == LinkState::IconSync && !self.init_sent && self.sender.is_idle() {
            self.init_sent = true;
            vec![Message::InitComplete]
        } else {
            Vec::new()
        }
    }

    /// Steady-state poll: diff the audio snapshot against what the device
    /// has and push only the delta
    fn poll_audio(&mut self, now: Instant) -> Vec<Message> {
        if !self.next_poll.is_some_and(|t| now >= t) {
            return Vec::new();
        }
        self.next_poll = Some(now + self.timings.poll_interval);

        let snapshot = match self.audio.snapshot() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Audio poll failed: {}", e);
                return Vec::new();
            }
        };

        let changes = diff(&self.last_snapshot, &snapshot);
        if changes.is_empty() {
            self.last_snapshot = snapshot;
            return Vec::new();
        }

        let mut out = Vec::new();

        // Single-field edits go out as targeted pushes; everything else
        // rides the app_changes diff.
        let mut updated = Vec::new();
        for entry in changes.updated {
            let prev = self.last_snapshot.iter().find(|e| e.name == entry.name);
            match prev {
                Some(p) if p.muted == entry.muted => out.push(Message::VolumeUpdate {
                    app: entry.name.clone(),
                    volume: entry.volume,
                }),
                Some(p) if p.volume == entry.volume => out.push(Message::MuteUpdate {
                    app: entry.name.clone(),
                    muted: entry.muted,
                }),
                _ => updated.push(entry),
            }
        }

        if !changes.added.is_empty() || !changes.removed.is_empty() || !updated.is_empty() {
            log::info!(
                "Session diff: +{} -{} ~{}",
                changes.added.len(),
                changes.removed.len(),
                updated.len()
            );
            self.enqueue_icons_for(&changes.added.clone());
            out.push(Message::AppChanges {
                added: changes.added,
                removed: changes.removed,
                updated,
            });
        }

        self.last_snapshot = snapshot;
        out
    }

    /// Queue icon transfers for entries advertising one, skipping apps
    /// already transferred this session
    fn enqueue_icons_for(&mut self, entries: &[AppEntry]) {
        for entry in entries {
            if !entry.has_icon || self.sender.sent().contains(&entry.name) {
                continue;
            }
            match self.audio.icon(&entry.name) {
                Ok(Some(bytes)) => self.sender.enqueue(&entry.name, bytes),
                Ok(None) => {
                    log::warn!("{} advertises an icon but none was found", entry.name)
                }
                Err(e) => log::warn!("Icon fetch failed for {}: {}", entry.name, e),
            }
        }
    }

    fn reset_session(&mut self) {
        self.sender.reset();
        self.last_snapshot.clear();
        self.deadline = None;
        self.next_poll = None;
        self.init_sent = false;
    }

    fn arm_deadline(&mut self, now: Instant) {
        self.deadline = Some(now + self.timings.step_timeout);
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            log::debug!("Host link state: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}
