//! Catalog, series and entry operations.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use bindery_common::{Archive, EntryMetadata, EntrySummary, Page, SeriesMetadata, SeriesSummary};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::info;

impl Store {
    /// Live series summaries in catalog order
    pub fn catalog(&self) -> StoreResult<Vec<SeriesSummary>> {
        self.view(|t| Ok(t.catalog().index()?.into_items()))
    }

    pub fn catalog_mod_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.view(|t| t.catalog().mod_time())
    }

    pub fn has_series(&self, sid: &str) -> StoreResult<bool> {
        self.view(|t| t.catalog().has_series(sid))
    }

    pub fn series(&self, sid: &str) -> StoreResult<SeriesSummary> {
        self.view(|t| t.catalog().series_summary(sid))
    }

    /// Title of the series folder, ignoring any override
    pub fn series_folder_title(&self, sid: &str) -> StoreResult<String> {
        self.view(|t| t.catalog().series(sid)?.title())
    }

    pub fn series_mod_time(&self, sid: &str) -> StoreResult<Option<DateTime<Utc>>> {
        self.view(|t| t.catalog().series(sid)?.mod_time())
    }

    /// Live entry summaries of a series in order
    pub fn entries(&self, sid: &str) -> StoreResult<Vec<EntrySummary>> {
        self.view(|t| Ok(t.catalog().series(sid)?.entries_index()?.into_items()))
    }

    pub fn entry(&self, sid: &str, eid: &str) -> StoreResult<EntrySummary> {
        self.view(|t| t.catalog().series(sid)?.entry_summary(eid))
    }

    pub fn has_entry(&self, sid: &str, eid: &str) -> StoreResult<bool> {
        self.view(|t| {
            let mut catalog = t.catalog();
            if !catalog.has_series(sid)? {
                return Ok(false);
            }
            catalog.series(sid)?.has_entry(eid)
        })
    }

    pub fn entry_archive(&self, sid: &str, eid: &str) -> StoreResult<Archive> {
        self.view(|t| t.catalog().entry(sid, eid)?.archive())
    }

    /// Page `num` (1-based) of an entry
    pub fn entry_page(&self, sid: &str, eid: &str, num: usize) -> StoreResult<Page> {
        self.view(|t| {
            t.catalog()
                .entry(sid, eid)?
                .page(num)?
                .ok_or_else(|| StoreError::PageNotFound {
                    sid: sid.to_string(),
                    eid: eid.to_string(),
                    num,
                })
        })
    }

    pub fn entry_mod_time(&self, sid: &str, eid: &str) -> StoreResult<DateTime<Utc>> {
        Ok(self.entry_archive(sid, eid)?.mod_time)
    }

    pub fn entry_order(&self, sid: &str, eid: &str) -> StoreResult<usize> {
        self.view(|t| t.catalog().entry(sid, eid)?.order())
    }

    pub fn delete_series(&self, sid: &str) -> StoreResult<()> {
        self.update(|t| t.catalog().delete_series(sid))?;
        info!(sid, "series deleted");
        Ok(())
    }

    /// Delete an entry and refresh its series' counts in the catalog.
    pub fn delete_entry(&self, sid: &str, eid: &str) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = t.catalog();
            catalog.series(sid)?.delete_entry(eid)?;
            catalog.regenerate()
        })?;
        info!(sid, eid, "entry deleted");
        Ok(())
    }

    /// Compact the catalog index and rewrite every series position
    pub fn regenerate_catalog(&self) -> StoreResult<()> {
        self.update(|t| t.catalog().regenerate())
    }

    // Tags

    pub fn set_series_tags<I, S>(&self, sid: &str, tags: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        self.update(|t| {
            let mut catalog = t.catalog();
            catalog.series(sid)?.set_tags(&tags)?;
            let mut summary = catalog.series_summary(sid)?;
            summary.tags = tags.iter().cloned().collect();
            catalog.set_series_summary(sid, summary)
        })
    }

    pub fn series_tags(&self, sid: &str) -> StoreResult<BTreeSet<String>> {
        self.view(|t| Ok(t.catalog().series(sid)?.tags()?.unwrap_or_default()))
    }

    /// Every tag used by at least one series
    pub fn all_tags(&self) -> StoreResult<BTreeSet<String>> {
        self.view(|t| {
            let mut catalog = t.catalog();
            let mut tags = BTreeSet::new();
            for sid in catalog.series_ids()? {
                tags.extend(catalog.series(&sid)?.tags()?.unwrap_or_default());
            }
            Ok(tags)
        })
    }

    pub fn series_with_tag(&self, tag: &str) -> StoreResult<Vec<SeriesSummary>> {
        self.view(|t| {
            let mut catalog = t.catalog();
            let mut found = Vec::new();
            for summary in catalog.index()?.into_items() {
                if catalog.series(&summary.hash)?.tags()?.is_some_and(|tags| tags.contains(tag)) {
                    found.push(summary);
                }
            }
            Ok(found)
        })
    }

    // Metadata overrides

    /// Store a series override and apply it to the catalog summary. A `None`
    /// title falls back to the folder title.
    pub fn set_series_metadata(&self, sid: &str, metadata: &SeriesMetadata) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = t.catalog();
            let mut series = catalog.series(sid)?;
            let folder_title = series.title()?;
            series.set_metadata(metadata)?;

            let mut summary = catalog.series_summary(sid)?;
            summary.title = metadata.title.clone().unwrap_or(folder_title);
            summary.author.clone_from(&metadata.author);
            summary.date_released = metadata.date_released;
            catalog.set_series_summary(sid, summary)
        })
    }

    pub fn series_metadata(&self, sid: &str) -> StoreResult<SeriesMetadata> {
        self.view(|t| Ok(t.catalog().series(sid)?.metadata()?.unwrap_or_default()))
    }

    /// Store an entry override and apply it to the series' entry summary. A
    /// `None` title falls back to the archive title.
    pub fn set_entry_metadata(
        &self,
        sid: &str,
        eid: &str,
        metadata: &EntryMetadata,
    ) -> StoreResult<()> {
        self.update(|t| {
            let mut catalog = t.catalog();
            let mut series = catalog.series(sid)?;
            let mut entry = series.entry(eid)?;
            let archive = entry.archive()?;
            entry.set_metadata(metadata)?;

            let mut summary = series.entry_summary(eid)?;
            summary.title = metadata.title.clone().unwrap_or(archive.title);
            summary.chapter = metadata.chapter;
            summary.volume = metadata.volume;
            summary.author.clone_from(&metadata.author);
            summary.date_released = metadata.date_released;
            series.set_entry_summary(eid, summary)
        })
    }

    pub fn entry_metadata(&self, sid: &str, eid: &str) -> StoreResult<EntryMetadata> {
        self.view(|t| Ok(t.catalog().entry(sid, eid)?.metadata()?.unwrap_or_default()))
    }
}
