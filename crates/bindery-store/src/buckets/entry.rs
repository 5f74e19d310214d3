//! Entry and Pages namespaces.

use super::raw::Bucket;
use crate::error::{StoreError, StoreResult};
use crate::kv::{KvRead, KvWrite};
use bindery_common::{Archive, Cover, EntryMetadata, Page};

const ARCHIVE: &str = "archive";
const COVER: &str = "cover";
const THUMBNAIL: &str = "thumbnail";
const ORDER: &str = "order";
const METADATA: &str = "metadata";
const PAGES: &str = "pages";

/// Key of a 1-based page number. Zero padded so key order is page order.
fn page_key(num: usize) -> String {
    format!("{num:08}")
}

/// One archive of a series
pub struct EntryBucket<'a, K: ?Sized> {
    inner: Bucket<'a, K>,
    sid: String,
    eid: String,
}

impl<'a, K: KvRead + ?Sized> EntryBucket<'a, K> {
    pub(crate) fn new(inner: Bucket<'a, K>, sid: &str, eid: &str) -> Self {
        Self {
            inner,
            sid: sid.to_string(),
            eid: eid.to_string(),
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn eid(&self) -> &str {
        &self.eid
    }

    pub fn archive(&self) -> StoreResult<Archive> {
        self.inner
            .get(ARCHIVE)?
            .ok_or_else(|| StoreError::EntryNotFound {
                sid: self.sid.clone(),
                eid: self.eid.clone(),
            })
    }

    pub fn cover(&self) -> StoreResult<Option<Cover>> {
        self.inner.get(COVER)
    }

    /// Cached thumbnail bytes, `None` when absent or empty
    pub fn thumbnail(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.get_bytes(THUMBNAIL)?.filter(|t| !t.is_empty()))
    }

    pub fn has_thumbnail(&self) -> StoreResult<bool> {
        Ok(self.thumbnail()?.is_some())
    }

    /// Stored 1-based position, 0 when unset
    pub fn order(&self) -> StoreResult<usize> {
        Ok(self.inner.get(ORDER)?.unwrap_or(0))
    }

    pub fn metadata(&self) -> StoreResult<Option<EntryMetadata>> {
        self.inner.get(METADATA)
    }

    pub fn page(&self, num: usize) -> StoreResult<Option<Page>> {
        if num == 0 {
            return Ok(None);
        }
        self.inner.get_at(&[PAGES], &page_key(num))
    }

    pub fn page_count(&self) -> StoreResult<usize> {
        Ok(self.inner.leaves_at(&[PAGES])?.len())
    }

    /// Handle to the pages namespace, `None` if the entry has no pages yet
    pub fn pages(&mut self) -> StoreResult<Option<PagesBucket<'_, K>>> {
        Ok(self.inner.child(PAGES)?.map(|inner| PagesBucket { inner }))
    }
}

impl<K: KvWrite + ?Sized> EntryBucket<'_, K> {
    pub fn set_archive(&mut self, archive: &Archive) -> StoreResult<()> {
        self.inner.put(ARCHIVE, archive)
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

    pub fn set_metadata(&mut self, metadata: &EntryMetadata) -> StoreResult<()> {
        self.inner.put(METADATA, metadata)
    }

    /// Replace every page descriptor, numbering from 1
    pub fn set_pages(&mut self, pages: &[Page]) -> StoreResult<()> {
        self.inner.delete_path(&[PAGES])?;
        let mut bucket = PagesBucket {
            inner: self.inner.create_path(&[PAGES])?,
        };
        for (i, page) in pages.iter().enumerate() {
            bucket.set_page(i + 1, page)?;
        }
        Ok(())
    }
}

/// Page descriptors of one entry keyed by 1-based page number
pub struct PagesBucket<'a, K: ?Sized> {
    inner: Bucket<'a, K>,
}

impl<K: KvRead + ?Sized> PagesBucket<'_, K> {
    pub fn page(&self, num: usize) -> StoreResult<Option<Page>> {
        if num == 0 {
            return Ok(None);
        }
        self.inner.get(&page_key(num))
    }

    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.inner.leaves()?.len())
    }

    /// Every page in page order
    pub fn list(&self) -> StoreResult<Vec<Page>> {
        self.inner
            .leaves()?
            .into_iter()
            .map(|(_, bytes)| crate::kv::decode(&bytes))
            .collect()
    }
}

impl<K: KvWrite + ?Sized> PagesBucket<'_, K> {
    pub fn set_page(&mut self, num: usize, page: &Page) -> StoreResult<()> {
        self.inner.put(&page_key(num), page)
    }
}
