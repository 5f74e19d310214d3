//! Cover and thumbnail resolution.
//!
//! A target's cover is its custom cover file when the path is set and the
//! file exists, otherwise the embedded cover of its archive (the first
//! entry's archive for a series). Thumbnails are cached in the namespace and
//! synthesized from the resolved cover on a miss.

use crate::buckets::CatalogBucket;
use crate::error::{StoreError, StoreResult};
use crate::kv::{KvRead, KvWrite};
use crate::pause::PauseController;
use crate::store::Store;
use bindery_common::{Archive, Cover};
use tracing::{debug, info, warn};

/// Image bytes with their MIME type
pub type ImageData = (Vec<u8>, &'static str);

const THUMBNAIL_MIME: &str = "image/jpeg";

impl Store {
    pub fn series_cover(&self, sid: &str) -> StoreResult<Cover> {
        self.view(|t| Ok(t.catalog().series(sid)?.cover()?.unwrap_or_default()))
    }

    pub fn entry_cover(&self, sid: &str, eid: &str) -> StoreResult<Cover> {
        self.view(|t| Ok(t.catalog().entry(sid, eid)?.cover()?.unwrap_or_default()))
    }

    /// Point a series at a custom cover. The cached thumbnail is dropped.
    pub fn set_series_cover(&self, sid: &str, cover: &Cover) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = t.catalog();
            let mut series = catalog.series(sid)?;
            series.set_cover(cover)?;
            series.clear_thumbnail()
        })
    }

    pub fn set_entry_cover(&self, sid: &str, eid: &str, cover: &Cover) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = t.catalog();
            let mut entry = catalog.entry(sid, eid)?;
            entry.set_cover(cover)?;
            entry.clear_thumbnail()
        })
    }

    pub fn series_cover_file(&self, sid: &str) -> StoreResult<ImageData> {
        self.view(|t| self.resolve_series_cover(&mut t.catalog(), sid))
    }

    pub fn entry_cover_file(&self, sid: &str, eid: &str) -> StoreResult<ImageData> {
        self.view(|t| self.resolve_entry_cover(&mut t.catalog(), sid, eid))
    }

    /// Remove the custom cover file and fall back to the embedded cover
    pub fn delete_series_cover(&self, sid: &str) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = t.catalog();
            let mut series = catalog.series(sid)?;
            let cover = series.cover()?.unwrap_or_default();
            self.remove_cover_file(&cover);
            series.set_cover(&Cover::default())?;
            series.clear_thumbnail()
        })
    }

    pub fn delete_entry_cover(&self, sid: &str, eid: &str) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = t.catalog();
            let mut entry = catalog.entry(sid, eid)?;
            let cover = entry.cover()?.unwrap_or_default();
            self.remove_cover_file(&cover);
            entry.set_cover(&Cover::default())?;
            entry.clear_thumbnail()
        })
    }

    // Thumbnails

    /// Cached series thumbnail, generated on a miss
    pub fn series_thumbnail(&self, sid: &str) -> StoreResult<ImageData> {
        let cached = self.view(|t| t.catalog().series(sid)?.thumbnail())?;
        let thumbnail = match cached {
            Some(thumbnail) => thumbnail,
            None => self.update(|t| self.series_thumbnail_in(&mut t.catalog(), sid, false))?,
        };
        Ok((thumbnail, THUMBNAIL_MIME))
    }

    /// Cached entry thumbnail, generated on a miss
    pub fn entry_thumbnail(&self, sid: &str, eid: &str) -> StoreResult<ImageData> {
        let cached = self.view(|t| t.catalog().entry(sid, eid)?.thumbnail())?;
        let thumbnail = match cached {
            Some(thumbnail) => thumbnail,
            None => self.update(|t| self.entry_thumbnail_in(&mut t.catalog(), sid, eid, false))?,
        };
        Ok((thumbnail, THUMBNAIL_MIME))
    }

    pub fn generate_series_thumbnail(&self, sid: &str, force: bool) -> StoreResult<()> {
        self.update(|t| self.series_thumbnail_in(&mut t.catalog(), sid, force))?;
        Ok(())
    }

    pub fn generate_entry_thumbnail(&self, sid: &str, eid: &str, force: bool) -> StoreResult<()> {
        self.update(|t| self.entry_thumbnail_in(&mut t.catalog(), sid, eid, force))?;
        Ok(())
    }

    /// Generate missing thumbnails (all of them if `force`) for every series
    /// and entry in the catalog, one transaction per series. Per-item
    /// failures are collected and do not stop the walk.
    pub fn generate_thumbnails(&self, force: bool, pause: &PauseController) -> StoreResult<()> {
        let _guard = pause.pause();
        let sids: Vec<String> = self.catalog()?.into_iter().map(|s| s.hash).collect();
        info!(series = sids.len(), force, "generating thumbnails");

        let mut errors = Vec::new();
        for sid in &sids {
            let result = self.update(|t| {
                let mut catalog = t.catalog();
                let mut failed = Vec::new();
                if let Err(e) = self.series_thumbnail_in(&mut catalog, sid, force) {
                    warn!(sid, error = %e, "series thumbnail failed");
                    failed.push(e);
                }
                let eids: Vec<String> = catalog
                    .series(sid)?
                    .entries_index()?
                    .iter()
                    .map(|e| e.hash.clone())
                    .collect();
                for eid in &eids {
                    if let Err(e) = self.entry_thumbnail_in(&mut catalog, sid, eid, force) {
                        warn!(sid, eid, error = %e, "entry thumbnail failed");
                        failed.push(e);
                    }
                }
                Ok(failed)
            });
            match result {
                Ok(failed) => errors.extend(failed),
                Err(e) => {
                    warn!(sid, error = %e, "thumbnail transaction failed");
                    errors.push(e);
                }
            }
        }

        info!(failed = errors.len(), "thumbnails generated");
        StoreError::aggregate(errors).map_or(Ok(()), Err)
    }

    fn series_thumbnail_in<K: KvWrite + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        sid: &str,
        force: bool,
    ) -> StoreResult<Vec<u8>> {
        if !force {
            if let Some(cached) = catalog.series(sid)?.thumbnail()? {
                return Ok(cached);
            }
        }
        let (image, _) = self.resolve_series_cover(catalog, sid)?;
        let thumbnail = self.make_thumbnail(&image, sid)?;
        catalog.series(sid)?.set_thumbnail(&thumbnail)?;
        debug!(sid, "generated series thumbnail");
        Ok(thumbnail)
    }

    fn entry_thumbnail_in<K: KvWrite + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        sid: &str,
        eid: &str,
        force: bool,
    ) -> StoreResult<Vec<u8>> {
        if !force {
            if let Some(cached) = catalog.entry(sid, eid)?.thumbnail()? {
                return Ok(cached);
            }
        }
        let (image, _) = self.resolve_entry_cover(catalog, sid, eid)?;
        let thumbnail = self.make_thumbnail(&image, eid)?;
        catalog.entry(sid, eid)?.set_thumbnail(&thumbnail)?;
        debug!(sid, eid, "generated entry thumbnail");
        Ok(thumbnail)
    }

    fn make_thumbnail(&self, image: &[u8], id: &str) -> StoreResult<Vec<u8>> {
        let thumbnail = self.thumbnailer.thumbnail(image)?;
        if thumbnail.is_empty() {
            return Err(StoreError::ThumbnailEmpty(id.to_string()));
        }
        Ok(thumbnail)
    }

    // Resolution

    fn resolve_series_cover<K: KvRead + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        sid: &str,
    ) -> StoreResult<ImageData> {
        let cover = catalog.series(sid)?.cover()?.unwrap_or_default();
        if let Some(found) = self.custom_cover(&cover)? {
            return Ok(found);
        }
        let archive = catalog.first_entry(sid)?.archive()?;
        self.embedded_cover(&archive)
    }

    fn resolve_entry_cover<K: KvRead + ?Sized>(
        &self,
        catalog: &mut CatalogBucket<'_, K>,
        sid: &str,
        eid: &str,
    ) -> StoreResult<ImageData> {
        let entry = catalog.entry(sid, eid)?;
        let cover = entry.cover()?.unwrap_or_default();
        if let Some(found) = self.custom_cover(&cover)? {
            return Ok(found);
        }
        self.embedded_cover(&entry.archive()?)
    }

    /// Custom cover bytes, `None` when unset or the file is gone
    fn custom_cover(&self, cover: &Cover) -> StoreResult<Option<ImageData>> {
        let Some(path) = cover.path.as_deref() else {
            return Ok(None);
        };
        if !self.fs.exists(path) {
            return Ok(None);
        }
        let data = self.fs.read(path)?;
        if data.is_empty() {
            return Err(StoreError::CoverEmpty(path.display().to_string()));
        }
        Ok(Some((data, cover.image_type.mime_type())))
    }

    fn embedded_cover(&self, archive: &Archive) -> StoreResult<ImageData> {
        let page = archive
            .cover
            .as_ref()
            .ok_or_else(|| StoreError::EmbeddedCoverNotFound(archive.title.clone()))?;
        let reader = self
            .archives
            .as_ref()
            .ok_or(StoreError::ArchiveReaderUnavailable)?;
        let data = reader.read_member(archive, &page.path)?;
        if data.is_empty() {
            return Err(StoreError::CoverEmpty(archive.title.clone()));
        }
        Ok((data, page.image_type.mime_type()))
    }

    fn remove_cover_file(&self, cover: &Cover) {
        if let Some(path) = cover.path.as_deref() {
            if let Err(e) = self.fs.remove(path) {
                debug!(path = %path.display(), error = %e, "could not remove cover file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::StoreError;
    use crate::fs::FileProbe;
    use crate::pause::PauseController;
    use crate::store::Store;
    use crate::store::testutil::*;
    use bindery_common::{Cover, hash_id};
    use std::path::Path;
    use std::sync::Arc;

    fn akira() -> Fixture {
        let fx = fixture();
        fx.store
            .populate_catalog(&[series("Akira", &[10, 20])], &PauseController::new())
            .unwrap();
        fx
    }

    #[test]
    fn test_embedded_cover_fallback() {
        let fx = akira();
        let sid = hash_id("Akira");

        let (data, mime) = fx.store.series_cover_file(&sid).unwrap();
        assert_eq!(data, b"Vol. 1:001.jpg");
        assert_eq!(mime, "image/jpeg");

        let (data, _) = fx.store.entry_cover_file(&sid, &hash_id("Vol. 2")).unwrap();
        assert_eq!(data, b"Vol. 2:001.jpg");
    }

    #[test]
    fn test_custom_cover_wins_while_it_exists() {
        let fx = akira();
        let sid = hash_id("Akira");
        fx.fs.add("/covers/akira.png", b"custom");
        fx.store
            .set_series_cover(&sid, &Cover::custom("/covers/akira.png").unwrap())
            .unwrap();

        let (data, mime) = fx.store.series_cover_file(&sid).unwrap();
        assert_eq!(data, b"custom");
        assert_eq!(mime, "image/png");

        fx.fs.vanish("/covers/akira.png");
        let (data, _) = fx.store.series_cover_file(&sid).unwrap();
        assert_eq!(data, b"Vol. 1:001.jpg");
    }

    #[test]
    fn test_empty_custom_cover_is_rejected() {
        let fx = akira();
        let sid = hash_id("Akira");
        fx.fs.add("/covers/empty.jpg", b"");
        fx.store
            .set_series_cover(&sid, &Cover::custom("/covers/empty.jpg").unwrap())
            .unwrap();

        let err = fx.store.series_cover_file(&sid).unwrap_err();
        assert!(matches!(err, StoreError::CoverEmpty(_)));
    }

    #[test]
    fn test_delete_cover_removes_file_and_thumbnail() {
        let fx = akira();
        let sid = hash_id("Akira");
        let eid = hash_id("Vol. 1");
        fx.fs.add("/covers/vol1.jpg", b"custom");
        fx.store
            .set_entry_cover(&sid, &eid, &Cover::custom("/covers/vol1.jpg").unwrap())
            .unwrap();
        let (thumb, _) = fx.store.entry_thumbnail(&sid, &eid).unwrap();
        assert_eq!(thumb, b"thumb:custom");

        fx.store.delete_entry_cover(&sid, &eid).unwrap();

        assert!(!fx.store.entry_cover(&sid, &eid).unwrap().is_custom());
        assert!(fx.fs.read(Path::new("/covers/vol1.jpg")).is_err());
        let (thumb, _) = fx.store.entry_thumbnail(&sid, &eid).unwrap();
        assert_eq!(thumb, b"thumb:Vol. 1:001.jpg");
    }

    #[test]
    fn test_thumbnail_is_cached() {
        let fx = akira();
        let sid = hash_id("Akira");

        let (thumb, mime) = fx.store.series_thumbnail(&sid).unwrap();
        assert_eq!(thumb, b"thumb:Vol. 1:001.jpg");
        assert_eq!(mime, "image/jpeg");

        // A new custom cover without regeneration keeps serving the cache
        fx.fs.add("/covers/akira.jpg", b"custom");
        fx.store
            .update(|t| {
                t.catalog()
                    .series(&sid)?
                    .set_cover(&Cover::custom("/covers/akira.jpg")?)
            })
            .unwrap();
        let (thumb, _) = fx.store.series_thumbnail(&sid).unwrap();
        assert_eq!(thumb, b"thumb:Vol. 1:001.jpg");

        fx.store.generate_series_thumbnail(&sid, true).unwrap();
        let (thumb, _) = fx.store.series_thumbnail(&sid).unwrap();
        assert_eq!(thumb, b"thumb:custom");
    }

    #[test]
    fn test_generate_thumbnails_collects_failures() {
        let fx = akira();
        let sid = hash_id("Akira");
        fx.store
            .update(|t| {
                let mut catalog = t.catalog();
                let mut entry = catalog.entry(&sid, &hash_id("Vol. 2"))?;
                let mut archive = entry.archive()?;
                archive.cover = None;
                entry.set_archive(&archive)
            })
            .unwrap();

        let err = fx
            .store
            .generate_thumbnails(false, &PauseController::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::EmbeddedCoverNotFound(_)));

        // Everything else was still generated
        let cached = fx
            .store
            .view(|t| {
                let mut catalog = t.catalog();
                Ok((
                    catalog.series(&sid)?.has_thumbnail()?,
                    catalog.entry(&sid, &hash_id("Vol. 1"))?.has_thumbnail()?,
                    catalog.entry(&sid, &hash_id("Vol. 2"))?.has_thumbnail()?,
                ))
            })
            .unwrap();
        assert_eq!(cached, (true, true, false));
    }

    #[test]
    fn test_missing_archive_reader() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(dir.path().join("bindery.db"))
            .unwrap()
            .with_file_probe(Arc::new(FakeFs::default()));
        store
            .populate_catalog(&[series("Akira", &[10])], &PauseController::new())
            .unwrap();

        let err = store.series_cover_file(&hash_id("Akira")).unwrap_err();
        assert!(matches!(err, StoreError::ArchiveReaderUnavailable));
    }
}
