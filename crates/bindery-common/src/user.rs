//! Users and per-user reading progress.

use crate::error::Error;
use crate::ids::{hash_id, hash_password};
use crate::types::EntrySummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Permission level of a user
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[default]
    Standard,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "standard" => Ok(Self::Standard),
            _ => Err(Error::UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Standard => f.write_str("standard"),
        }
    }
}

/// A user account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Id derived from the username
    pub hash: String,
    pub name: String,
    /// Hex SHA-256 digest of the password
    pub pass: String,
    pub role: Role,
    pub progress: CatalogProgress,
}

impl User {
    /// Build a user from a username and plaintext password.
    #[must_use]
    pub fn new(name: &str, pass: &str, role: Role) -> Self {
        Self {
            hash: hash_id(name),
            name: name.to_string(),
            pass: hash_password(pass),
            role,
            progress: CatalogProgress::default(),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub fn password_matches(&self, pass: &str) -> bool {
        self.pass == hash_password(pass)
    }
}

/// Reading position within one entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryProgress {
    pub current: usize,
    pub total: usize,
}

impl EntryProgress {
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Set the current page, clamped to the entry's page count
    pub fn set(&mut self, page: usize) {
        self.current = page.min(self.total);
    }

    pub const fn set_read(&mut self) {
        self.current = self.total;
    }

    pub const fn set_unread(&mut self) {
        self.current = 0;
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = self.current as f64 / self.total as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

/// Progress for every entry of a series, one slot per entry position
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesProgress {
    pub entries: Vec<Option<EntryProgress>>,
}

impl SeriesProgress {
    /// Fresh progress sized to the given entries
    #[must_use]
    pub fn for_entries(entries: &[EntrySummary]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|e| Some(EntryProgress::new(e.pages)))
                .collect(),
        }
    }

    /// Reallocate to match the current entry list, copying overlapping slots
    /// by position. Returns `true` if anything changed.
    pub fn reconcile(&mut self, entries: &[EntrySummary]) -> bool {
        if self.entries.len() == entries.len() && self.entries.iter().all(Option::is_some) {
            return false;
        }
        let old = std::mem::take(&mut self.entries);
        self.entries = entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                old.get(i)
                    .copied()
                    .flatten()
                    .or_else(|| Some(EntryProgress::new(e.pages)))
            })
            .collect();
        true
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&EntryProgress> {
        self.entries.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut EntryProgress> {
        self.entries.get_mut(index).and_then(Option::as_mut)
    }

    pub fn set_all_read(&mut self) {
        self.entries.iter_mut().flatten().for_each(EntryProgress::set_read);
    }

    pub fn set_all_unread(&mut self) {
        self.entries.iter_mut().flatten().for_each(EntryProgress::set_unread);
    }

    /// Drop the slots whose index fails the predicate, keeping relative order.
    pub fn retain_slots(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let mut index = 0;
        self.entries.retain(|_| {
            let k = keep(index);
            index += 1;
            k
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Progress for every series a user has opened, keyed by series id
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProgress {
    pub series: BTreeMap<String, SeriesProgress>,
}

impl CatalogProgress {
    #[must_use]
    pub fn get(&self, sid: &str) -> Option<&SeriesProgress> {
        self.series.get(sid)
    }

    pub fn set(&mut self, sid: &str, progress: SeriesProgress) {
        self.series.insert(sid.to_string(), progress);
    }

    pub fn remove(&mut self, sid: &str) -> Option<SeriesProgress> {
        self.series.remove(sid)
    }

    /// Progress for a series, allocated or resized to the current entries.
    /// Returns the progress and whether it had to be changed.
    pub fn reconciled(&mut self, sid: &str, entries: &[EntrySummary]) -> (&mut SeriesProgress, bool) {
        let mut changed = false;
        let progress = self.series.entry(sid.to_string()).or_insert_with(|| {
            changed = true;
            SeriesProgress::for_entries(entries)
        });
        changed |= progress.reconcile(entries);
        (progress, changed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
