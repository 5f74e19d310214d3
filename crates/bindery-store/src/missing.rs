//! Missing-item audit and repair.
//!
//! The structural pass checks every series and entry namespace against its
//! parent index and the filesystem. The progress pass checks every user's
//! progress against the series and entries it points at. The auditor only
//! reports; the repairer deletes what the auditor would report.

use crate::buckets::{CatalogBucket, UsersBucket};
use crate::error::StoreResult;
use crate::kv::{KvRead, KvWrite};
use crate::pause::PauseController;
use crate::store::Store;
use bindery_common::{Cover, MissingItem, MissingKind};
use std::path::Path;
use tracing::{debug, info};

impl Store {
    /// Report inconsistent items. Only the first problem found on an item is
    /// reported.
    pub fn missing_items(&self, pause: &PauseController) -> StoreResult<Vec<MissingItem>> {
        pause.wait_if_paused();
        self.view(|t| {
            let mut items = Vec::new();
            let mut catalog = CatalogBucket::new(&mut t.catalog);
            let mut users = UsersBucket::new(&mut t.users);
            self.audit_catalog(&mut catalog, &mut items)?;
            self.audit_progress(&mut catalog, &mut users, &mut items)?;
            Ok(items)
        })
    }

    /// Delete everything `missing_items` would report, in one transaction.
    ///
    /// Progress is pruned first, while entry positions still match the
    /// progress slots. The structural pass then deletes stale series and
    /// entries, and a final sweep drops progress for series it removed.
    pub fn delete_missing_items(&self, pause: &PauseController) -> StoreResult<()> {
        let _guard = pause.pause();
        let removed = self.update(|t| {
            let mut catalog = CatalogBucket::new(&mut t.catalog);
            let mut users = UsersBucket::new(&mut t.users);
            self.prune_progress(&mut catalog, &mut users, true)?;
            let removed = self.repair_catalog(&mut catalog)?;
            self.prune_progress(&mut catalog, &mut users, false)?;
            Ok(removed)
        })?;
        info!(
            series = removed.series,
            entries = removed.entries,
            covers = removed.covers,
            "deleted missing items"
        );
        Ok(())
    }

    fn audit_catalog<K: KvRead + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        items: &mut Vec<MissingItem>,
    ) -> StoreResult<()> {
        let index = catalog.index()?;
        for sid in catalog.series_ids()? {
            let mut series = catalog.series(&sid)?;
            let title = series.title()?;
            if !index.slot_matches(series.order()?, &sid) {
                items.push(missing(MissingKind::Series, &title, ""));
                continue;
            }
            let cover = series.cover()?.unwrap_or_default();
            if let Some(path) = self.stale_cover(&cover) {
                items.push(missing_cover(path));
            }

            let entries = series.entries_index()?;
            for eid in series.entry_ids()? {
                let entry = series.entry(&eid)?;
                let archive = entry.archive()?;
                let path = archive.path.display().to_string();
                let cover = entry.cover()?.unwrap_or_default();
                if !entries.slot_matches(entry.order()?, &eid) {
                    items.push(missing(MissingKind::Entry, &archive.title, &path));
                } else if !self.fs.exists(&archive.path) {
                    items.push(missing(MissingKind::Archive, &archive.title, &path));
                } else if let Some(stale) = self.stale_cover(&cover) {
                    items.push(missing_cover(stale));
                }
            }
        }
        Ok(())
    }

    fn audit_progress<K: KvRead + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        users: &mut UsersBucket<'_, K>,
        items: &mut Vec<MissingItem>,
    ) -> StoreResult<()> {
        for uid in users.user_ids()? {
            let user = users.user(&uid)?;
            let name = user.name()?;
            for (sid, progress) in &user.progress()?.series {
                if !catalog.has_series(sid)? {
                    items.push(missing(MissingKind::Progress, &name, &format!("series {sid}")));
                    continue;
                }
                for slot in 0..progress.len() {
                    if !self.progress_slot_valid(catalog, sid, slot)? {
                        let path = format!("series {sid}, entry {}", slot + 1);
                        items.push(missing(MissingKind::Progress, &name, &path));
                    }
                }
            }
        }
        Ok(())
    }

    /// Drop progress for series that no longer exist or have no slots left.
    /// With `check_slots`, also drop slots that point past the entries index
    /// or at an entry whose archive is gone.
    fn prune_progress<K: KvWrite + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        users: &mut UsersBucket<'_, K>,
        check_slots: bool,
    ) -> StoreResult<()> {
        for uid in users.user_ids()? {
            let mut user = users.user(&uid)?;
            let mut progress = user.progress()?;
            let mut changed = false;
            let sids: Vec<String> = progress.series.keys().cloned().collect();
            for sid in sids {
                if !catalog.has_series(&sid)? {
                    progress.remove(&sid);
                    changed = true;
                    continue;
                }
                let Some(series) = progress.series.get_mut(&sid) else {
                    continue;
                };
                if check_slots {
                    let mut valid = Vec::with_capacity(series.len());
                    for slot in 0..series.len() {
                        valid.push(self.progress_slot_valid(catalog, &sid, slot)?);
                    }
                    let before = series.len();
                    series.retain_slots(|slot| valid[slot]);
                    changed |= series.len() != before;
                }
                if series.is_empty() {
                    progress.remove(&sid);
                    changed = true;
                }
            }
            if changed {
                debug!(uid, "pruned progress");
                user.set_progress(&progress)?;
            }
        }
        Ok(())
    }

    /// Slot `slot` (0-based) of a series' progress maps onto a live entry
    /// whose archive still exists.
    fn progress_slot_valid<K: KvRead + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        sid: &str,
        slot: usize,
    ) -> StoreResult<bool> {
        let entries = catalog.series(sid)?.entries_index()?;
        let Some(summary) = entries.get(slot + 1) else {
            return Ok(false);
        };
        let mut series = catalog.series(sid)?;
        if !series.has_entry(&summary.hash)? {
            return Ok(false);
        }
        let archive = series.entry(&summary.hash)?.archive()?;
        Ok(self.fs.exists(&archive.path))
    }

    /// Structural pass of the repairer
    fn repair_catalog<K: KvWrite + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
    ) -> StoreResult<Removed> {
        let mut removed = Removed::default();
        for sid in catalog.series_ids()? {
            let order = catalog.series(&sid)?.order()?;
            if !catalog.index()?.slot_matches(order, &sid) {
                catalog.delete_series(&sid)?;
                removed.series += 1;
                continue;
            }

            let mut series = catalog.series(&sid)?;
            let cover = series.cover()?.unwrap_or_default();
            if self.stale_cover(&cover).is_some() {
                series.set_cover(&Cover::default())?;
                series.clear_thumbnail()?;
                removed.covers += 1;
            }

            for eid in series.entry_ids()? {
                let entries = series.entries_index()?;
                let mut entry = series.entry(&eid)?;
                let archive = entry.archive()?;
                if !entries.slot_matches(entry.order()?, &eid) || !self.fs.exists(&archive.path) {
                    series.delete_entry(&eid)?;
                    removed.entries += 1;
                    continue;
                }
                let cover = entry.cover()?.unwrap_or_default();
                if self.stale_cover(&cover).is_some() {
                    entry.set_cover(&Cover::default())?;
                    entry.clear_thumbnail()?;
                    removed.covers += 1;
                }
            }

            if series.entries_index()?.live() == 0 {
                catalog.delete_series(&sid)?;
                removed.series += 1;
            }
        }
        catalog.regenerate()?;
        Ok(removed)
    }

    /// Path of a custom cover whose file is gone
    fn stale_cover<'c>(&self, cover: &'c Cover) -> Option<&'c Path> {
        cover.path.as_deref().filter(|path| !self.fs.exists(path))
    }
}

#[derive(Debug, Default)]
struct Removed {
    series: usize,
    entries: usize,
    covers: usize,
}

// Cover rows are titled by the missing file's name
fn missing_cover(path: &Path) -> MissingItem {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    missing(MissingKind::Cover, &name, &path.display().to_string())
}

fn missing(kind: MissingKind, title: &str, path: &str) -> MissingItem {
    MissingItem {
        kind,
        title: title.to_string(),
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::pause::PauseController;
    use crate::progress::EntryProgressUpdate;
    use crate::store::testutil::*;
    use bindery_common::{Cover, MissingKind, Role, hash_id};

    fn library() -> Fixture {
        let fx = fixture();
        let parsed = [series("Akira", &[10, 20, 30]), series("Berserk", &[5])];
        fx.store.populate_catalog(&parsed, &PauseController::new()).unwrap();
        fx.store.create_user("reader", "secret", Role::Standard).unwrap();
        fx
    }

    fn kinds(fx: &Fixture) -> Vec<MissingKind> {
        let items = fx.store.missing_items(&PauseController::new()).unwrap();
        items.into_iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_clean_catalog_has_nothing_missing() {
        let fx = library();
        let (uid, sid, eid) = (hash_id("reader"), hash_id("Akira"), hash_id("Vol. 2"));
        fx.store
            .set_entry_progress(&uid, &sid, &eid, EntryProgressUpdate::Page(4))
            .unwrap();
        assert!(kinds(&fx).is_empty());
    }

    #[test]
    fn test_audit_reports_first_problem_per_item() {
        let fx = library();
        let sid = hash_id("Akira");
        fx.fs.add("/covers/vol2.jpg", b"cover");
        let cover = Cover::custom("/covers/vol2.jpg").unwrap();
        fx.store.set_entry_cover(&sid, &hash_id("Vol. 2"), &cover).unwrap();
        fx.fs.vanish("/covers/vol2.jpg");
        fx.fs.vanish(archive_path("Akira", "Vol. 2"));

        let items = fx.store.missing_items(&PauseController::new()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, MissingKind::Archive);
        assert_eq!(items[0].title, "Vol. 2");
    }

    #[test]
    fn test_audit_reports_orphaned_series_and_stale_progress() {
        let fx = library();
        let uid = hash_id("reader");
        fx.store
            .set_series_progress(&uid, &hash_id("Berserk"), true)
            .unwrap();
        // Berserk drops out of the next scan
        fx.store
            .populate_catalog(&[series("Akira", &[10, 20, 30])], &PauseController::new())
            .unwrap();
        fx.fs.vanish(archive_path("Berserk", "Vol. 1"));

        let mut found = kinds(&fx);
        found.sort_by_key(ToString::to_string);
        assert_eq!(found, [MissingKind::Progress, MissingKind::Series]);
    }

    #[test]
    fn test_repair_deletes_entry_with_missing_archive() {
        let fx = library();
        let uid = hash_id("reader");
        let sid = hash_id("Akira");
        fx.store
            .set_entry_progress(&uid, &sid, &hash_id("Vol. 1"), EntryProgressUpdate::Page(3))
            .unwrap();
        fx.store
            .set_entry_progress(&uid, &sid, &hash_id("Vol. 3"), EntryProgressUpdate::Read)
            .unwrap();
        fx.fs.vanish(archive_path("Akira", "Vol. 2"));

        fx.store.delete_missing_items(&PauseController::new()).unwrap();

        let entries = fx.store.entries(&sid).unwrap();
        let titles: Vec<_> = entries.iter().map(|e| (e.title.as_str(), e.order)).collect();
        assert_eq!(titles, [("Vol. 1", 1), ("Vol. 3", 2)]);
        assert_eq!(fx.store.series(&sid).unwrap().entries, 2);

        let progress = fx.store.series_progress(&uid, &sid).unwrap();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress.get(0).map(|p| p.current), Some(3));
        assert_eq!(progress.get(1).map(|p| p.current), Some(30));
        assert!(kinds(&fx).is_empty());
    }

    #[test]
    fn test_repair_removes_series_without_entries() {
        let fx = library();
        let uid = hash_id("reader");
        let sid = hash_id("Berserk");
        fx.store.set_series_progress(&uid, &sid, true).unwrap();
        fx.fs.vanish(archive_path("Berserk", "Vol. 1"));

        fx.store.delete_missing_items(&PauseController::new()).unwrap();

        let catalog = fx.store.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].title, "Akira");
        assert_eq!(catalog[0].order, 1);
        assert!(!fx.store.has_series(&sid).unwrap());
        assert!(fx.store.user_progress(&uid).unwrap().get(&sid).is_none());
    }

    #[test]
    fn test_repair_resets_stale_cover_but_keeps_tags() {
        let fx = library();
        let sid = hash_id("Akira");
        fx.store.set_series_tags(&sid, ["classic"]).unwrap();
        fx.fs.add("/covers/akira.jpg", b"cover");
        fx.store
            .set_series_cover(&sid, &Cover::custom("/covers/akira.jpg").unwrap())
            .unwrap();
        fx.fs.vanish("/covers/akira.jpg");
        let items = fx.store.missing_items(&PauseController::new()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, MissingKind::Cover);
        assert_eq!(items[0].title, "akira.jpg");
        assert_eq!(items[0].path, "/covers/akira.jpg");

        fx.store.delete_missing_items(&PauseController::new()).unwrap();

        assert!(!fx.store.series_cover(&sid).unwrap().is_custom());
        assert_eq!(fx.store.series_tags(&sid).unwrap().len(), 1);
        assert_eq!(fx.store.catalog().unwrap().len(), 2);
    }

    #[test]
    fn test_repair_removes_orphaned_series() {
        let fx = library();
        fx.store
            .populate_catalog(&[series("Berserk", &[5])], &PauseController::new())
            .unwrap();

        fx.store.delete_missing_items(&PauseController::new()).unwrap();

        assert!(!fx.store.has_series(&hash_id("Akira")).unwrap());
        let catalog = fx.store.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(fx.store.series(&hash_id("Berserk")).unwrap().order, 1);
    }

    #[test]
    fn test_repair_settles_tombstoned_catalog() {
        let fx = library();
        let akira = hash_id("Akira");
        // Slot tombstoned by an interrupted delete, catalog never regenerated
        fx.store
            .update(|t| {
                let mut catalog = t.catalog();
                let mut index = catalog.index()?;
                assert!(index.tombstone(1, &akira));
                catalog.set_index(&index)
            })
            .unwrap();

        let items = fx.store.missing_items(&PauseController::new()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, MissingKind::Series);
        assert_eq!(items[0].title, "Akira");

        fx.store.delete_missing_items(&PauseController::new()).unwrap();

        let index = fx.store.view(|t| t.catalog().index()).unwrap();
        assert!(index.is_settled());
        assert!(!fx.store.has_series(&akira).unwrap());
        let berserk = hash_id("Berserk");
        assert_eq!(fx.store.series(&berserk).unwrap().order, 1);
        let stored = fx.store.view(|t| t.catalog().series(&berserk)?.order()).unwrap();
        assert_eq!(stored, 1);
        assert!(kinds(&fx).is_empty());
    }

    #[test]
    fn test_repair_settles_tombstoned_entries() {
        let fx = library();
        let sid = hash_id("Akira");
        let vol2 = hash_id("Vol. 2");
        fx.store
            .update(|t| {
                let mut catalog = t.catalog();
                let mut series = catalog.series(&sid)?;
                let mut index = series.entries_index()?;
                assert!(index.tombstone(2, &vol2));
                series.set_entries_index(&index)
            })
            .unwrap();

        let items = fx.store.missing_items(&PauseController::new()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, MissingKind::Entry);
        assert_eq!(items[0].title, "Vol. 2");

        fx.store.delete_missing_items(&PauseController::new()).unwrap();

        let index = fx
            .store
            .view(|t| t.catalog().series(&sid)?.entries_index())
            .unwrap();
        assert!(index.is_settled());
        let entries = fx.store.entries(&sid).unwrap();
        let titles: Vec<_> = entries.iter().map(|e| (e.title.as_str(), e.order)).collect();
        assert_eq!(titles, [("Vol. 1", 1), ("Vol. 3", 2)]);
        for entry in &entries {
            assert_eq!(fx.store.entry_order(&sid, &entry.hash).unwrap(), entry.order);
        }
        assert_eq!(fx.store.series(&sid).unwrap().entries, 2);
        assert!(kinds(&fx).is_empty());
    }
}
