//! Per-user reading progress.
//!
//! Progress for a series holds one slot per entry position. Every call first
//! reconciles the stored progress against the series' current entries and
//! persists the result in the same transaction, so progress never drifts
//! from the entries it describes.

use crate::buckets::{CatalogBucket, UsersBucket};
use crate::error::{StoreError, StoreResult};
use crate::kv::KvWrite;
use crate::store::Store;
use bindery_common::{CatalogProgress, EntryProgress, SeriesProgress};
use tracing::debug;

/// Change applied to a single entry's progress
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryProgressUpdate {
    Read,
    Unread,
    /// Jump to a page, clamped to the entry's page count
    Page(usize),
}

impl Store {
    /// Stored progress of a user, without reconciliation
    pub fn user_progress(&self, uid: &str) -> StoreResult<CatalogProgress> {
        self.view(|t| t.users().user(uid)?.progress())
    }

    pub fn series_progress(&self, uid: &str, sid: &str) -> StoreResult<SeriesProgress> {
        self.update(|t| {
            let mut catalog = CatalogBucket::new(&mut t.catalog);
            let mut users = UsersBucket::new(&mut t.users);
            with_series_progress(&mut catalog, &mut users, uid, sid, |progress| {
                Ok(progress.clone())
            })
        })
    }

    pub fn entry_progress(&self, uid: &str, sid: &str, eid: &str) -> StoreResult<EntryProgress> {
        self.update(|t| {
            let mut catalog = CatalogBucket::new(&mut t.catalog);
            let mut users = UsersBucket::new(&mut t.users);
            let slot = entry_slot(&mut catalog, sid, eid)?;
            with_series_progress(&mut catalog, &mut users, uid, sid, |progress| {
                progress.get(slot).copied().ok_or_else(|| progress_missing(uid, sid))
            })
        })
    }

    /// Mark every entry of a series read or unread
    pub fn set_series_progress(&self, uid: &str, sid: &str, read: bool) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = CatalogBucket::new(&mut t.catalog);
            let mut users = UsersBucket::new(&mut t.users);
            with_series_progress(&mut catalog, &mut users, uid, sid, |progress| {
                if read {
                    progress.set_all_read();
                } else {
                    progress.set_all_unread();
                }
                Ok(())
            })
        })
    }

    pub fn set_entry_progress(
        &self,
        uid: &str,
        sid: &str,
        eid: &str,
        update: EntryProgressUpdate,
    ) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = CatalogBucket::new(&mut t.catalog);
            let mut users = UsersBucket::new(&mut t.users);
            let slot = entry_slot(&mut catalog, sid, eid)?;
            with_series_progress(&mut catalog, &mut users, uid, sid, |progress| {
                let entry = progress
                    .get_mut(slot)
                    .ok_or_else(|| progress_missing(uid, sid))?;
                match update {
                    EntryProgressUpdate::Read => entry.set_read(),
                    EntryProgressUpdate::Unread => entry.set_unread(),
                    EntryProgressUpdate::Page(page) => entry.set(page),
                }
                Ok(())
            })
        })
    }
}

/// 0-based progress slot of an entry
fn entry_slot<K: KvWrite + ?Sized>(
    catalog: &mut CatalogBucket<'_, K>,
    sid: &str,
    eid: &str,
) -> StoreResult<usize> {
    let order = catalog.series(sid)?.entry_summary(eid)?.order;
    Ok(order - 1)
}

/// Run `f` on a user's reconciled progress for a series and save the
/// progress if reconciliation or `f` changed it.
fn with_series_progress<K, R>(
    catalog: &mut CatalogBucket<'_, K>,
    users: &mut UsersBucket<'_, K>,
    uid: &str,
    sid: &str,
    f: impl FnOnce(&mut SeriesProgress) -> StoreResult<R>,
) -> StoreResult<R>
where
    K: KvWrite + ?Sized,
{
    let entries = catalog.series(sid)?.entries_index()?.into_items();
    let mut user = users.user(uid)?;
    let mut progress = user.progress()?;

    let (series, reconciled) = progress.reconciled(sid, &entries);
    let before = series.clone();
    let result = f(&mut *series)?;
    let changed = reconciled || *series != before;

    if changed {
        if reconciled {
            debug!(uid, sid, entries = entries.len(), "reconciled progress");
        }
        user.set_progress(&progress)?;
    }
    Ok(result)
}

fn progress_missing(uid: &str, sid: &str) -> StoreError {
    StoreError::ProgressNotFound {
        uid: uid.to_string(),
        sid: sid.to_string(),
    }
}
