//! Series namespace: scalar fields, the EntriesMetadata index, and the
//! entries it owns.

use super::entry::EntryBucket;
use super::raw::Bucket;
use crate::error::{StoreError, StoreResult};
use crate::index::OrderedIndex;
use crate::kv::{KvRead, KvWrite};
use bindery_common::{Cover, EntrySummary, ParsedEntry, SeriesMetadata, hash_id};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

const TITLE: &str = "title";
const TAGS: &str = "tags";
const COVER: &str = "cover";
const THUMBNAIL: &str = "thumbnail";
const ORDER: &str = "order";
const MOD_TIME: &str = "modtime";
const METADATA: &str = "metadata";
const ENTRIES_METADATA: &str = "entries-metadata";
pub(crate) const ENTRIES_DATA: &str = "entries-data";

pub struct SeriesBucket<'a, K: ?Sized> {
    inner: Bucket<'a, K>,
    sid: String,
}

impl<'a, K: KvRead + ?Sized> SeriesBucket<'a, K> {
    pub(crate) fn new(inner: Bucket<'a, K>, sid: &str) -> Self {
        Self {
            inner,
            sid: sid.to_string(),
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Folder title as last seen by the parser
    pub fn title(&self) -> StoreResult<String> {
        Ok(self.inner.get(TITLE)?.unwrap_or_default())
    }

    pub fn tags(&self) -> StoreResult<Option<BTreeSet<String>>> {
        self.inner.get(TAGS)
    }

    pub fn cover(&self) -> StoreResult<Option<Cover>> {
        self.inner.get(COVER)
    }

    pub fn thumbnail(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.get_bytes(THUMBNAIL)?.filter(|t| !t.is_empty()))
    }

    pub fn has_thumbnail(&self) -> StoreResult<bool> {
        Ok(self.thumbnail()?.is_some())
    }

    /// Stored 1-based position in the catalog, 0 when unset
    pub fn order(&self) -> StoreResult<usize> {
        Ok(self.inner.get(ORDER)?.unwrap_or(0))
    }

    pub fn mod_time(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.get(MOD_TIME)
    }

    pub fn metadata(&self) -> StoreResult<Option<SeriesMetadata>> {
        self.inner.get(METADATA)
    }

    pub fn entries_index(&self) -> StoreResult<OrderedIndex<EntrySummary>> {
        Ok(self.inner.get(ENTRIES_METADATA)?.unwrap_or_default())
    }

    /// Ids of every entry namespace, in key order
    pub fn entry_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.names_at(&[ENTRIES_DATA])
    }

    pub fn has_entry(&self, eid: &str) -> StoreResult<bool> {
        self.inner.has_path(&[ENTRIES_DATA, eid])
    }

    pub fn entry(&mut self, eid: &str) -> StoreResult<EntryBucket<'_, K>> {
        let sid = self.sid.clone();
        match self.inner.descend(&[ENTRIES_DATA, eid])? {
            Some(inner) => Ok(EntryBucket::new(inner, &sid, eid)),
            None => Err(StoreError::EntryNotFound {
                sid,
                eid: eid.to_string(),
            }),
        }
    }

    /// Id of the entry at position 1
    pub fn first_entry_id(&self) -> StoreResult<Option<String>> {
        Ok(self.entries_index()?.iter().next().map(|e| e.hash.clone()))
    }

    /// Summary of an entry, located through the entry's stored order
    pub fn entry_summary(&mut self, eid: &str) -> StoreResult<EntrySummary> {
        let order = self.entry(eid)?.order()?;
        self.entries_index()?
            .get(order)
            .filter(|e| e.hash == eid)
            .cloned()
            .ok_or_else(|| StoreError::EntryMetadataNotFound {
                sid: self.sid.clone(),
                eid: eid.to_string(),
            })
    }
}

impl<K: KvWrite + ?Sized> SeriesBucket<'_, K> {
    pub fn set_title(&mut self, title: &str) -> StoreResult<()> {
        self.inner.put(TITLE, title)
    }

    pub fn set_tags(&mut self, tags: &BTreeSet<String>) -> StoreResult<()> {
        self.inner.put(TAGS, tags)
    }

    pub fn set_cover(&mut self, cover: &Cover) -> StoreResult<()> {
        self.inner.put(COVER, cover)
    }

    pub fn set_thumbnail(&mut self, thumbnail: &[u8]) -> StoreResult<()> {
        self.inner.put_bytes(THUMBNAIL, thumbnail)
    }

    pub fn clear_thumbnail(&mut self) -> StoreResult<()> {
        self.inner.delete(THUMBNAIL)?;
        Ok(())
    }

    pub fn set_order(&mut self, order: usize) -> StoreResult<()> {
        self.inner.put(ORDER, &order)
    }

    pub fn set_mod_time(&mut self, mod_time: DateTime<Utc>) -> StoreResult<()> {
        self.inner.put(MOD_TIME, &mod_time)
    }

    pub fn set_metadata(&mut self, metadata: &SeriesMetadata) -> StoreResult<()> {
        self.inner.put(METADATA, metadata)
    }

    pub fn set_entries_index(&mut self, index: &OrderedIndex<EntrySummary>) -> StoreResult<()> {
        self.inner.put(ENTRIES_METADATA, index)
    }

    /// Replace the summary of an existing entry in place
    pub fn set_entry_summary(&mut self, eid: &str, mut summary: EntrySummary) -> StoreResult<()> {
        let order = self.entry(eid)?.order()?;
        let mut index = self.entries_index()?;
        if !index.slot_matches(order, eid) {
            return Err(StoreError::EntryMetadataNotFound {
                sid: self.sid.clone(),
                eid: eid.to_string(),
            });
        }
        summary.order = order;
        index.set(order, summary);
        self.set_entries_index(&index)
    }

    /// Create (or reuse) the namespace for a parsed archive and write its
    /// archive descriptor, default cover, position and pages.
    pub fn add_entry(&mut self, parsed: &ParsedEntry, order: usize) -> StoreResult<String> {
        let eid = hash_id(&parsed.archive.title);
        let sid = self.sid.clone();
        let mut entry = EntryBucket::new(self.inner.create_path(&[ENTRIES_DATA, eid.as_str()])?, &sid, &eid);
        entry.set_archive(&parsed.archive)?;
        if entry.cover()?.is_none() {
            entry.set_cover(&Cover::default())?;
        }
        entry.set_order(order)?;
        entry.set_pages(&parsed.pages)?;
        Ok(eid)
    }

    /// Tombstone the entry's slot, destroy its namespace, then compact the
    /// EntriesMetadata index.
    pub fn delete_entry(&mut self, eid: &str) -> StoreResult<()> {
        let order = self.entry(eid)?.order()?;
        let mut index = self.entries_index()?;
        if index.tombstone(order, eid) {
            self.set_entries_index(&index)?;
        }
        self.inner.delete_path(&[ENTRIES_DATA, eid])?;
        debug!(sid = %self.sid, eid, "deleted entry");
        self.regenerate_entries()
    }

    /// Compact the EntriesMetadata index and write each survivor's new
    /// position back into its namespace. Slots whose namespace is gone are
    /// dropped.
    pub fn regenerate_entries(&mut self) -> StoreResult<()> {
        let mut index = self.entries_index()?;
        let existing: HashSet<String> = self.entry_ids()?.into_iter().collect();
        index.tombstone_where(|e| existing.contains(&e.hash));
        for (eid, order) in index.compact() {
            self.entry(&eid)?.set_order(order)?;
        }
        self.set_entries_index(&index)
    }
}
