//! Snapshot diff engine
//!
//! The host polls its audio enumerator on an interval and diffs the fresh
//! snapshot against the previous one; only a non-empty diff goes on the wire
//! (bandwidth suppression on a slow serial link).

use crate::wire::{AppChanges, AppEntry};
use std::collections::HashMap;

/// Compute the (added, removed, updated) triple between two snapshots
///
/// - added: names in `new` but not `old`
/// - removed: names in `old` but not `new`
/// - updated: names in both where volume or muted differs
///
/// Icon presence changes alone do not mark an entry updated; icons move
/// through their own subprotocol.
pub fn diff(old: &[AppEntry], new: &[AppEntry]) -> AppChanges {
    let old_by_name: HashMap<&str, &AppEntry> =
        old.iter().map(|e| (e.name.as_str(), e)).collect();
    let new_names: HashMap<&str, ()> = new.iter().map(|e| (e.name.as_str(), ())).collect();

    let mut changes = AppChanges::default();

    for entry in new {
        match old_by_name.get(entry.name.as_str()) {
            None => changes.added.push(entry.clone()),
            Some(prev) => {
                if prev.volume != entry.volume || prev.muted != entry.muted {
                    changes.updated.push(entry.clone());
                }
            }
        }
    }

    for entry in old {
        if !new_names.contains_key(entry.name.as_str()) {
            changes.removed.push(entry.name.clone());
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionTable;

    fn entry(name: &str, volume: u8, muted: bool) -> AppEntry {
        AppEntry {
            name: name.to_string(),
            volume,
            muted,
            has_icon: false,
        }
    }

    #[test]
    fn test_identical_snapshots_empty_diff() {
        let snap = vec![entry("Chrome", 50, false), entry("Spotify", 30, true)];
        assert!(diff(&snap, &snap).is_empty());
    }

    #[test]
    fn test_added_removed_updated() {
        let old = vec![entry("Chrome", 50, false), entry("Spotify", 30, false)];
        let new = vec![entry("Chrome", 80, false), entry("Discord", 60, false)];

        let changes = diff(&old, &new);
        assert_eq!(changes.added, vec![entry("Discord", 60, false)]);
        assert_eq!(changes.removed, vec!["Spotify".to_string()]);
        assert_eq!(changes.updated, vec![entry("Chrome", 80, false)]);
    }

    #[test]
    fn test_mute_change_is_update() {
        let old = vec![entry("Chrome", 50, false)];
        let new = vec![entry("Chrome", 50, true)];
        let changes = diff(&old, &new);
        assert_eq!(changes.updated.len(), 1);
        assert!(changes.added.is_empty() && changes.removed.is_empty());
    }

    #[test]
    fn test_added_removed_disjoint() {
        let old = vec![entry("A", 1, false), entry("B", 2, false)];
        let new = vec![entry("B", 2, false), entry("C", 3, false)];
        let changes = diff(&old, &new);
        for added in &changes.added {
            assert!(!changes.removed.contains(&added.name));
        }
    }

    #[test]
    fn test_apply_diff_reproduces_target() {
        let old = vec![
            entry("Chrome", 50, false),
            entry("Spotify", 30, false),
            entry("Discord", 70, true),
        ];
        let new = vec![
            entry("Chrome", 90, true),
            entry("Discord", 70, true),
            entry("Teams", 40, false),
        ];

        let mut table = SessionTable::new();
        table.apply_initial_config(&old);
        table.apply_changes(&diff(&old, &new));

        assert_eq!(table.len(), new.len());
        for target in &new {
            let session = table.get(&target.name).unwrap();
            assert_eq!(session.volume, target.volume);
            assert_eq!(session.muted, target.muted);
        }
    }
}
