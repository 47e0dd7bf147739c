//! Device-side protocol state machine
//!
//! Drives handshake -> config exchange -> icon sync -> steady state. The
//! machine is poll-driven: `handle_message` reacts to decoded frames,
//! `poll` starts the probe and expires deadlines. It never blocks, so the
//! cooperative device loop stays responsive mid-handshake.
//!
//! A message received while not in its expected state is logged and ignored,
//! never fatal. Every step has a bounded wait; on expiry the machine aborts
//! to `Idle` and retries after a backoff delay.

use super::icon::IconReceiver;
use super::state::LinkState;
use crate::config::Timings;
use crate::store::SessionTable;
use crate::wire::Message;
use std::time::Instant;

/// Device-side responder
pub struct Responder {
    state: LinkState,
    icon_rx: IconReceiver,
    /// `init_complete` arrived before all expected icons; replayed when the
    /// last icon lands (exact-match gating)
    init_complete_pending: bool,
    /// Bounded wait for the current step
    deadline: Option<Instant>,
    /// No probe before this passes (post-abort backoff)
    backoff_until: Option<Instant>,
    timings: Timings,
    violations: u64,
}

impl Responder {
    pub fn new(timings: Timings) -> Self {
        Self {
            state: LinkState::Idle,
            icon_rx: IconReceiver::new(),
            init_complete_pending: false,
            deadline: None,
            backoff_until: None,
            timings,
            violations: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// True once the link reached steady state (diffs and commands only)
    pub fn is_steady(&self) -> bool {
        self.state == LinkState::SteadyState
    }

    /// Count of wrong-state messages ignored so far
    pub fn violation_count(&self) -> u64 {
        self.violations
    }

    /// Advance time-driven behavior: start the probe from `Idle`, expire the
    /// current step's deadline
    pub fn poll(&mut self, table: &mut SessionTable, now: Instant) -> Vec<Message> {
        match self.state {
            LinkState::Idle => {
                if self.backoff_until.is_some_and(|t| now < t) {
                    return Vec::new();
                }
                self.backoff_until = None;
                self.transition(LinkState::Handshaking);
                self.arm_deadline(now);
                vec![Message::Test]
            }
            LinkState::Handshaking | LinkState::ConfigExchange | LinkState::IconSync => {
                if self.deadline.is_some_and(|d| now >= d) {
                    log::warn!("Step timed out in state {}, aborting to idle", self.state);
                    self.abort_to_idle(table, now);
                }
                Vec::new()
            }
            LinkState::Disconnected => {
                if !self.backoff_until.is_some_and(|t| now < t) {
                    self.transition(LinkState::Idle);
                }
                Vec::new()
            }
            LinkState::SteadyState | LinkState::Error => Vec::new(),
        }
    }

    /// React to one decoded message, returning any replies to send
    pub fn handle_message(
        &mut self,
        table: &mut SessionTable,
        msg: &Message,
        now: Instant,
    ) -> Vec<Message> {
        match (self.state, msg) {
            (LinkState::Handshaking, Message::TestResponse { status }) => {
                log::info!("Handshake confirmed (status: {})", status);
                self.transition(LinkState::ConfigExchange);
                self.arm_deadline(now);
                vec![Message::RequestInitialConfig]
            }

            (LinkState::ConfigExchange, Message::InitialConfig { data }) => {
                let unique = table.apply_initial_config(data);
                self.init_complete_pending = false;
                self.icon_rx.reset();
                self.transition(LinkState::IconSync);
                self.arm_deadline(now);
                vec![Message::config_received(unique)]
            }

            (LinkState::IconSync | LinkState::SteadyState, Message::IconData { app }) => {
                if self.state == LinkState::IconSync {
                    self.arm_deadline(now);
                }
                self.icon_rx
                    .handle_announce(table, app)
                    .into_iter()
                    .collect()
            }

            (LinkState::IconSync | LinkState::SteadyState, Message::IconDataB64 { app, data }) => {
                if self.state == LinkState::IconSync {
                    self.arm_deadline(now);
                }
                let mut out: Vec<Message> = self
                    .icon_rx
                    .handle_b64(table, app, data)
                    .into_iter()
                    .collect();
                out.extend(self.maybe_finish_sync(table));
                out
            }

            (LinkState::IconSync, Message::InitComplete) => {
                if table.icons_complete() {
                    self.enter_steady(table)
                } else {
                    log::info!(
                        "init_complete before all icons ({}/{}), holding",
                        table.received_icons(),
                        table.expected_icons()
                    );
                    self.init_complete_pending = true;
                    self.arm_deadline(now);
                    Vec::new()
                }
            }

            (_, Message::Error { message }) => {
                log::error!("Peer reported error: {}", message);
                Vec::new()
            }

            (state, msg) => {
                self.violations += 1;
                log::warn!("Ignoring {:?} in state {}", discriminant_name(msg), state);
                Vec::new()
            }
        }
    }

    /// React to a marker-framed icon payload from the deprecated framing
    pub fn handle_icon_payload(
        &mut self,
        table: &mut SessionTable,
        app: &str,
        bytes: Vec<u8>,
        now: Instant,
    ) -> Vec<Message> {
        if !matches!(self.state, LinkState::IconSync | LinkState::SteadyState) {
            self.violations += 1;
            log::warn!("Ignoring icon payload for {} in state {}", app, self.state);
            return Vec::new();
        }
        if self.state == LinkState::IconSync {
            self.arm_deadline(now);
        }
        let mut out: Vec<Message> = self
            .icon_rx
            .handle_payload(table, app, bytes)
            .into_iter()
            .collect();
        out.extend(self.maybe_finish_sync(table));
        out
    }

    /// Transport failure: invalidate everything, no state leaks across
    /// reconnects
    pub fn on_disconnect(&mut self, table: &mut SessionTable, now: Instant) {
        log::warn!("Link disconnected in state {}, resetting session", self.state);
        table.clear();
        self.icon_rx.reset();
        self.init_complete_pending = false;
        self.deadline = None;
        self.backoff_until = Some(now + self.timings.retry_backoff);
        self.transition(LinkState::Disconnected);
    }

    /// Repeated transport failures: give up with an externally visible state
    pub fn escalate_error(&mut self, table: &mut SessionTable) {
        table.clear();
        self.icon_rx.reset();
        self.init_complete_pending = false;
        self.deadline = None;
        self.transition(LinkState::Error);
    }

    /// Ready gating: only fires once `received_icons == expected_icons` and
    /// a (possibly held) `init_complete` was seen
    fn maybe_finish_sync(&mut self, table: &SessionTable) -> Vec<Message> {
        if self.state == LinkState::IconSync
            && self.init_complete_pending
            && table.icons_complete()
        {
            return self.enter_steady(table);
        }
        Vec::new()
    }

    fn enter_steady(&mut self, table: &SessionTable) -> Vec<Message> {
        log::info!(
            "Sync complete: {} apps, {}/{} icons",
            table.len(),
            table.received_icons(),
            table.expected_icons()
        );
        self.init_complete_pending = false;
        self.deadline = None;
        self.transition(LinkState::SteadyState);
        vec![Message::Ready]
    }

    fn abort_to_idle(&mut self, table: &mut SessionTable, now: Instant) {
        table.clear();
        self.icon_rx.reset();
        self.init_complete_pending = false;
        self.deadline = None;
        self.backoff_until = Some(now + self.timings.retry_backoff);
        self.transition(LinkState::Idle);
    }

    fn arm_deadline(&mut self, now: Instant) {
        self.deadline = Some(now + self.timings.step_timeout);
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            log::debug!("Link state: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

/// Message name for wrong-state logging without dumping payloads
fn discriminant_name(msg: &Message) -> &'static str {
    match msg {
        Message::Test => "test",
        Message::TestResponse { .. } => "test_response",
        Message::RequestInitialConfig => "request_initial_config",
        Message::InitialConfig { .. } => "initial_config",
        Message::ConfigReceived { .. } => "config_received",
        Message::IconData { .. } => "icon_data",
        Message::ReadyForIcon { .. } => "ready_for_icon",
        Message::IconDataB64 { .. } => "icon_data_b64",
        Message::IconParsed { .. } => "icon_parsed",
        Message::AppChanges { .. } => "app_changes",
        Message::VolumeUpdate { .. } => "volume_update",
        Message::MuteUpdate { .. } => "mute_update",
        Message::SetVolume { .. } => "set_volume",
        Message::ToggleMute { .. } => "toggle_mute",
        Message::InitComplete => "init_complete",
        Message::Ready => "ready",
        Message::Error { .. } => "error",
    }
}
