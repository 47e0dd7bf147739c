//! Session store: the canonical name -> {volume, muted, icon} table
//!
//! Owned exclusively by the device-side dispatch loop; there is exactly one
//! writer. Built wholesale from an initial config, mutated incrementally
//! afterwards.

mod diff;

pub use diff::diff;

use crate::error::{Error, Result};
use crate::wire::{AppChanges, AppEntry, ICON_BYTE_SIZE};
use std::collections::HashMap;

/// Maximum volume value; wire values above this are clamped
pub const VOLUME_MAX: u8 = 100;

/// One tracked audio session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub volume: u8,
    pub muted: bool,
    /// Fixed-size RGB565 bitmap; always exactly [`ICON_BYTE_SIZE`] bytes
    /// when present, never partially written
    pub icon: Option<Vec<u8>>,
}

impl Session {
    fn from_entry(entry: &AppEntry) -> Self {
        Session {
            name: entry.name.clone(),
            volume: entry.volume.min(VOLUME_MAX),
            muted: entry.muted,
            icon: None,
        }
    }

    /// Wire representation of this session
    pub fn to_entry(&self) -> AppEntry {
        AppEntry {
            name: self.name.clone(),
            volume: self.volume,
            muted: self.muted,
            has_icon: self.icon.is_some(),
        }
    }
}

/// The session table plus icon sync accounting
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
    expected_icons: usize,
    received_icons: usize,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table atomically from a full snapshot
    ///
    /// Duplicate names are dropped, first occurrence wins. Resets icon
    /// accounting: `expected_icons` counts entries flagged `has_icon`.
    /// Returns the unique session count (reported back in `config_received`).
    pub fn apply_initial_config(&mut self, entries: &[AppEntry]) -> usize {
        let mut sessions = HashMap::with_capacity(entries.len());
        let mut expected = 0;
        for entry in entries {
            if sessions.contains_key(&entry.name) {
                log::debug!("Duplicate app in initial config, keeping first: {}", entry.name);
                continue;
            }
            if entry.has_icon {
                expected += 1;
            }
            sessions.insert(entry.name.clone(), Session::from_entry(entry));
        }

        self.sessions = sessions;
        self.expected_icons = expected;
        self.received_icons = 0;
        log::info!(
            "Initial config applied: {} unique apps, {} icons expected",
            self.sessions.len(),
            self.expected_icons
        );
        self.sessions.len()
    }

    /// Attach an icon bitmap to a known session
    ///
    /// Rejects unknown names and wrong-length payloads without mutating
    /// anything. On success the icon is stored whole and `received_icons`
    /// increments.
    pub fn apply_icon(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        if bytes.len() != ICON_BYTE_SIZE {
            return Err(Error::IconSizeMismatch {
                expected: ICON_BYTE_SIZE,
                actual: bytes.len(),
            });
        }
        let session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| Error::UnknownApp(name.to_string()))?;
        session.icon = Some(bytes);
        self.received_icons += 1;
        log::debug!(
            "Icon stored for {} ({}/{})",
            name,
            self.received_icons,
            self.expected_icons
        );
        Ok(())
    }

    /// Apply an incremental diff
    ///
    /// Added entries upsert; removed names delete (no-op if absent); updated
    /// entries merge volume/mute onto an existing session and preserve a
    /// previously stored icon. Returns the names actually touched.
    pub fn apply_changes(&mut self, changes: &AppChanges) -> Vec<String> {
        let mut touched = Vec::new();

        for entry in &changes.added {
            self.sessions
                .insert(entry.name.clone(), Session::from_entry(entry));
            touched.push(entry.name.clone());
        }

        for name in &changes.removed {
            if self.sessions.remove(name).is_some() {
                touched.push(name.clone());
            } else {
                log::debug!("Removal of unknown app ignored: {}", name);
            }
        }

        for entry in &changes.updated {
            match self.sessions.get_mut(&entry.name) {
                Some(session) => {
                    session.volume = entry.volume.min(VOLUME_MAX);
                    session.muted = entry.muted;
                    // Icon bytes stay untouched; updates never carry them.
                    touched.push(entry.name.clone());
                }
                None => log::debug!("Update for unknown app ignored: {}", entry.name),
            }
        }

        touched
    }

    /// Single-field volume push
    pub fn set_volume(&mut self, name: &str, volume: u8) -> Result<()> {
        let session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| Error::UnknownApp(name.to_string()))?;
        session.volume = volume.min(VOLUME_MAX);
        Ok(())
    }

    /// Single-field mute push
    pub fn set_muted(&mut self, name: &str, muted: bool) -> Result<()> {
        let session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| Error::UnknownApp(name.to_string()))?;
        session.muted = muted;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Session> {
        self.sessions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Snapshot as wire entries (order unspecified)
    pub fn entries(&self) -> Vec<AppEntry> {
        self.sessions.values().map(Session::to_entry).collect()
    }

    pub fn expected_icons(&self) -> usize {
        self.expected_icons
    }

    pub fn received_icons(&self) -> usize {
        self.received_icons
    }

    /// True once every expected icon has arrived (ready gating)
    pub fn icons_complete(&self) -> bool {
        self.received_icons >= self.expected_icons
    }

    /// Drop everything, including icon accounting (disconnect reset)
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.expected_icons = 0;
        self.received_icons = 0;
    }
}
