//! Per-entity expiry bookkeeping.
//!
//! Entries are kept sorted ascending by expiry time so the earliest one is
//! always at the front. Equal times keep insertion order.

use std::collections::VecDeque;

use super::{BuffId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpiryEntry {
    pub expires_at: Timestamp,
    pub buff_id: BuffId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpiryQueue {
    entries: VecDeque<ExpiryEntry>,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry behind every entry expiring at or before it.
    pub fn insert(&mut self, expires_at: Timestamp, buff_id: BuffId) {
        let at = self
            .entries
            .iter()
            .rposition(|entry| entry.expires_at <= expires_at)
            .map_or(0, |index| index + 1);
        self.entries.insert(at, ExpiryEntry { expires_at, buff_id });
    }

    /// Removes and returns every entry with `expires_at <= now`, earliest first.
    pub fn pop_expired(&mut self, now: Timestamp) -> Vec<ExpiryEntry> {
        let mut expired = Vec::new();
        while let Some(entry) = self.entries.front() {
            if entry.expires_at > now {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                expired.push(entry);
            }
        }
        expired
    }

    pub fn next_expiry(&self) -> Option<Timestamp> {
        self.entries.front().map(|entry| entry.expires_at)
    }

    /// Drops the latest-expiring entry of `buff_id`, if any.
    pub fn drop_latest(&mut self, buff_id: BuffId) -> Option<ExpiryEntry> {
        let index = self
            .entries
            .iter()
            .rposition(|entry| entry.buff_id == buff_id)?;
        self.entries.remove(index)
    }

    /// Drops every entry of `buff_id`.
    pub fn purge(&mut self, buff_id: BuffId) {
        self.entries.retain(|entry| entry.buff_id != buff_id);
    }

    pub fn pending(&self, buff_id: BuffId) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.buff_id == buff_id)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpiryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
