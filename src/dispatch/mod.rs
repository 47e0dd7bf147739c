//! Device-side input dispatch
//!
//! Turns deck input events (app selection, encoder ticks, mute button) into
//! outbound control messages, and applies inbound host pushes to the session
//! table. Encoder ticks are debounced per app: the first tick in a window
//! goes out immediately, later ticks coalesce so only the latest value is
//! sent when the window closes.

use crate::store::SessionTable;
use crate::wire::Message;
use std::collections::HashMap;
use std::time::Instant;

/// One physical input on the deck
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// User selected an app on the deck UI
    AppSelected(String),
    /// Encoder tick resolved to an absolute volume target
    VolumeChange { app: String, volume: u8 },
    /// Mute button press
    ToggleMute { app: String },
}

/// What the deck UI needs to redraw after an inbound push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiRefresh {
    /// Sessions touched by the push
    pub apps: Vec<String>,
    /// The currently selected session changed or disappeared
    pub affects_selected: bool,
}

/// Debouncing command dispatcher
pub struct CommandDispatcher {
    selected: Option<String>,
    /// Latest coalesced volume per app, not yet flushed
    pending_volume: HashMap<String, u8>,
    /// When the last volume message went out, per app
    last_sent: HashMap<String, Instant>,
    debounce: std::time::Duration,
}

impl CommandDispatcher {
    pub fn new(debounce: std::time::Duration) -> Self {
        Self {
            selected: None,
            pending_volume: HashMap::new(),
            last_sent: HashMap::new(),
            debounce,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Handle one input event, returning any messages to send now
    pub fn handle_event(&mut self, event: InputEvent, now: Instant) -> Vec<Message> {
        match event {
            InputEvent::AppSelected(app) => {
                log::debug!("Selected {}", app);
                self.selected = Some(app);
                Vec::new()
            }
            InputEvent::VolumeChange { app, volume } => {
                let window_open = self
                    .last_sent
                    .get(&app)
                    .is_some_and(|t| now.duration_since(*t) < self.debounce);
                if window_open {
                    // Coalesce: only the latest value survives the window.
                    self.pending_volume.insert(app, volume);
                    Vec::new()
                } else {
                    self.pending_volume.remove(&app);
                    self.last_sent.insert(app.clone(), now);
                    vec![Message::SetVolume { app, volume }]
                }
            }
            InputEvent::ToggleMute { app } => {
                // Mute is not rate limited; a press always goes out.
                vec![Message::ToggleMute { app }]
            }
        }
    }

    /// Flush coalesced volume values whose debounce window has closed
    pub fn poll(&mut self, now: Instant) -> Vec<Message> {
        let mut out = Vec::new();
        let matured: Vec<String> = self
            .pending_volume
            .keys()
            .filter(|app| {
                !self
                    .last_sent
                    .get(*app)
                    .is_some_and(|t| now.duration_since(*t) < self.debounce)
            })
            .cloned()
            .collect();
        for app in matured {
            if let Some(volume) = self.pending_volume.remove(&app) {
                self.last_sent.insert(app.clone(), now);
                out.push(Message::SetVolume { app, volume });
            }
        }
        out
    }

    /// Apply an inbound host push to the session table
    ///
    /// Returns what the UI needs to redraw, or `None` if the push changed
    /// nothing (unknown app, empty diff).
    pub fn apply_update(
        &mut self,
        table: &mut SessionTable,
        msg: &Message,
    ) -> Option<UiRefresh> {
        match msg {
            Message::VolumeUpdate { app, volume } => {
                if table.set_volume(app, *volume).is_err() {
                    log::warn!("volume_update for unknown app {}", app);
                    return None;
                }
                Some(UiRefresh {
                    apps: vec![app.clone()],
                    affects_selected: self.affects_selected(app),
                })
            }
            Message::MuteUpdate { app, muted } => {
                if table.set_muted(app, *muted).is_err() {
                    log::warn!("mute_update for unknown app {}", app);
                    return None;
                }
                Some(UiRefresh {
                    apps: vec![app.clone()],
                    affects_selected: self.affects_selected(app),
                })
            }
            Message::AppChanges {
                added,
                removed,
                updated,
            } => {
                let changes = crate::wire::AppChanges {
                    added: added.clone(),
                    removed: removed.clone(),
                    updated: updated.clone(),
                };
                if changes.is_empty() {
                    return None;
                }
                let touched = table.apply_changes(&changes);
                let selected_gone = self
                    .selected
                    .as_ref()
                    .is_some_and(|s| removed.contains(s));
                if selected_gone {
                    log::info!("Selected app {} removed", self.selected.as_deref().unwrap_or(""));
                    self.selected = None;
                }
                let affects_selected =
                    selected_gone || touched.iter().any(|a| self.affects_selected(a));
                Some(UiRefresh {
                    apps: touched,
                    affects_selected,
                })
            }
            _ => None,
        }
    }

    fn affects_selected(&self, app: &str) -> bool {
        self.selected.as_deref() == Some(app)
    }
}
