//! Download records keyed by a monotonically increasing sequence id.

use super::raw::Bucket;
use crate::error::StoreResult;
use crate::kv::{KvRead, KvWrite, decode};
use bindery_common::Download;

const SEQUENCE: &str = "sequence";

fn download_key(id: u64) -> String {
    format!("{id:016x}")
}

pub struct DownloadsBucket<'a, K: ?Sized> {
    inner: Bucket<'a, K>,
}

impl<'a, K: KvRead + ?Sized> DownloadsBucket<'a, K> {
    pub fn new(kv: &'a mut K) -> Self {
        Self {
            inner: Bucket::root(kv),
        }
    }

    /// Every record, oldest first
    pub fn list(&self) -> StoreResult<Vec<(u64, Download)>> {
        let mut downloads = Vec::new();
        for (key, bytes) in self.inner.leaves()? {
            let Ok(id) = u64::from_str_radix(&key, 16) else {
                continue;
            };
            downloads.push((id, decode(&bytes)?));
        }
        Ok(downloads)
    }
}

impl<K: KvWrite + ?Sized> DownloadsBucket<'_, K> {
    fn next_id(&mut self) -> StoreResult<u64> {
        let id = self.inner.get::<u64>(SEQUENCE)?.unwrap_or(0) + 1;
        self.inner.put(SEQUENCE, &id)?;
        Ok(id)
    }

    pub fn add(&mut self, download: &Download) -> StoreResult<u64> {
        let id = self.next_id()?;
        self.inner.put(&download_key(id), download)?;
        Ok(id)
    }

    pub fn update(&mut self, id: u64, download: &Download) -> StoreResult<()> {
        self.inner.put(&download_key(id), download)
    }

    pub fn delete(&mut self, id: u64) -> StoreResult<bool> {
        self.inner.delete(&download_key(id))
    }
}
