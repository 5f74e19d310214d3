//! Catalog root: one namespace per series plus the Catalog index.

use super::entry::EntryBucket;
use super::raw::Bucket;
use super::series::{ENTRIES_DATA, SeriesBucket};
use crate::error::{StoreError, StoreResult};
use crate::index::OrderedIndex;
use crate::kv::{KvRead, KvWrite};
use bindery_common::{Cover, EntryMetadata, EntrySummary, ParsedSeries, SeriesSummary, hash_id};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

const CATALOG: &str = "catalog";
const MOD_TIME: &str = "modtime";

pub struct CatalogBucket<'a, K: ?Sized> {
    inner: Bucket<'a, K>,
}

impl<'a, K: KvRead + ?Sized> CatalogBucket<'a, K> {
    pub fn new(kv: &'a mut K) -> Self {
        Self {
            inner: Bucket::root(kv),
        }
    }

    pub fn index(&self) -> StoreResult<OrderedIndex<SeriesSummary>> {
        Ok(self.inner.get(CATALOG)?.unwrap_or_default())
    }

    /// Earliest series modification time, written by the populator
    pub fn mod_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.get(MOD_TIME)
    }

    /// Ids of every series namespace, in key order
    pub fn series_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.child_names()
    }

    pub fn has_series(&self, sid: &str) -> StoreResult<bool> {
        self.inner.has_child(sid)
    }

    pub fn series(&mut self, sid: &str) -> StoreResult<SeriesBucket<'_, K>> {
        match self.inner.child(sid)? {
            Some(inner) => Ok(SeriesBucket::new(inner, sid)),
            None => Err(StoreError::SeriesNotFound(sid.to_string())),
        }
    }

    pub fn entry(&mut self, sid: &str, eid: &str) -> StoreResult<EntryBucket<'_, K>> {
        if !self.has_series(sid)? {
            return Err(StoreError::SeriesNotFound(sid.to_string()));
        }
        match self.inner.descend(&[sid, ENTRIES_DATA, eid])? {
            Some(inner) => Ok(EntryBucket::new(inner, sid, eid)),
            None => Err(StoreError::EntryNotFound {
                sid: sid.to_string(),
                eid: eid.to_string(),
            }),
        }
    }

    /// The entry at position 1 of a series
    pub fn first_entry(&mut self, sid: &str) -> StoreResult<EntryBucket<'_, K>> {
        let eid = self
            .series(sid)?
            .first_entry_id()?
            .ok_or_else(|| StoreError::EntryNotFound {
                sid: sid.to_string(),
                eid: String::new(),
            })?;
        self.entry(sid, &eid)
    }

    /// Catalog summary of a series, located through its stored order
    pub fn series_summary(&mut self, sid: &str) -> StoreResult<SeriesSummary> {
        let order = self.series(sid)?.order()?;
        self.index()?
            .get(order)
            .filter(|s| s.hash == sid)
            .cloned()
            .ok_or_else(|| StoreError::CatalogEntryNotFound(sid.to_string()))
    }
}

impl<K: KvWrite + ?Sized> CatalogBucket<'_, K> {
    pub fn set_index(&mut self, index: &OrderedIndex<SeriesSummary>) -> StoreResult<()> {
        self.inner.put(CATALOG, index)
    }

    pub fn set_mod_time(&mut self, mod_time: DateTime<Utc>) -> StoreResult<()> {
        self.inner.put(MOD_TIME, &mod_time)
    }

    /// Replace the catalog summary of a series in place
    pub fn set_series_summary(&mut self, sid: &str, mut summary: SeriesSummary) -> StoreResult<()> {
        let order = self.series(sid)?.order()?;
        let mut index = self.index()?;
        if !index.slot_matches(order, sid) {
            return Err(StoreError::CatalogEntryNotFound(sid.to_string()));
        }
        summary.order = order;
        index.set(order, summary);
        self.set_index(&index)
    }

    /// Merge a freshly parsed series into the store.
    ///
    /// Existing tags and custom covers are kept. An entry whose archive
    /// modification time changed is deleted and rebuilt. Stored metadata
    /// overrides win over parsed values and are re-saved merged. Entries are
    /// positioned by parsed order. Returns the series id.
    pub fn add_series(&mut self, parsed: &ParsedSeries) -> StoreResult<String> {
        if parsed.entries.is_empty() {
            return Err(StoreError::NoEntries(parsed.title.clone()));
        }
        let mut seen = HashSet::new();
        for entry in &parsed.entries {
            if !seen.insert(hash_id(&entry.archive.title)) {
                return Err(StoreError::DuplicateEntry {
                    series: parsed.title.clone(),
                    title: entry.archive.title.clone(),
                });
            }
        }

        let sid = hash_id(&parsed.title);
        let mut series = SeriesBucket::new(self.inner.create_child(&sid)?, &sid);
        series.set_title(&parsed.title)?;
        if series.tags()?.is_none() {
            series.set_tags(&BTreeSet::new())?;
        }
        if series.cover()?.is_none() {
            series.set_cover(&Cover::default())?;
        }

        let mut ordered: Vec<_> = parsed.entries.iter().collect();
        ordered.sort_by_key(|e| e.order);

        // Must run before any entry is positioned, delete_entry compacts the
        // old index and rewrites positions
        for parsed_entry in &ordered {
            let eid = hash_id(&parsed_entry.archive.title);
            if series.has_entry(&eid)?
                && series.entry(&eid)?.archive()?.mod_time != parsed_entry.archive.mod_time
            {
                debug!(sid = %sid, eid = %eid, "archive changed, replacing entry");
                series.delete_entry(&eid)?;
            }
        }

        let mut summaries = Vec::with_capacity(ordered.len());
        let mut mod_time = ordered[0].archive.mod_time;
        for (i, parsed_entry) in ordered.into_iter().enumerate() {
            let order = i + 1;
            let archive = &parsed_entry.archive;
            let eid = hash_id(&archive.title);
            series.add_entry(parsed_entry, order)?;

            let mut summary = EntrySummary {
                order,
                hash: eid.clone(),
                title: archive.title.clone(),
                pages: parsed_entry.pages.len(),
                path: archive.path.clone(),
                chapter: parsed_entry.metadata.chapter,
                volume: parsed_entry.metadata.volume,
                author: parsed_entry.metadata.author.clone(),
                date_released: parsed_entry.metadata.date_released,
            };
            let mut entry = series.entry(&eid)?;
            if let Some(stored) = entry.metadata()? {
                stored.apply_to(&mut summary);
            }
            entry.set_metadata(&EntryMetadata::from_summary(&summary))?;
            summaries.push(summary);

            mod_time = mod_time.min(archive.mod_time);
        }

        series.set_mod_time(mod_time)?;
        series.set_entries_index(&OrderedIndex::from_items(summaries))?;
        Ok(sid)
    }

    /// Tombstone the series' slot, destroy its namespace, then compact the
    /// Catalog index.
    pub fn delete_series(&mut self, sid: &str) -> StoreResult<()> {
        let order = self.series(sid)?.order()?;
        let mut index = self.index()?;
        if index.tombstone(order, sid) {
            self.set_index(&index)?;
        }
        self.inner.delete_child(sid)?;
        debug!(sid, "deleted series");
        self.regenerate()
    }

    /// Compact the Catalog index, write each survivor's new position back
    /// into its namespace and refresh its derived entry and page counts.
    /// Slots whose namespace is gone are dropped.
    pub fn regenerate(&mut self) -> StoreResult<()> {
        let mut index = self.index()?;
        let existing: HashSet<String> = self.series_ids()?.into_iter().collect();
        index.tombstone_where(|s| existing.contains(&s.hash));
        index.compact();
        for summary in index.iter_mut() {
            let mut series = self.series(&summary.hash)?;
            series.set_order(summary.order)?;
            let entries = series.entries_index()?;
            summary.entries = entries.live();
            summary.total_pages = entries.iter().map(|e| e.pages).sum();
        }
        self.set_index(&index)
    }
}
