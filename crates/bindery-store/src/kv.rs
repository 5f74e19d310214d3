//! Raw key/value access over redb tables.
//!
//! `KvRead` is implemented for every readable table so the typed views in
//! `buckets` work unchanged inside read and write transactions. Returned
//! values are copied out of the engine.

use crate::error::StoreResult;
use redb::{ReadableTable, Table};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Read access to one `&str -> &[u8]` table
pub trait KvRead {
    fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// First key at or after `from`
    fn first_key_from(&self, from: &str) -> StoreResult<Option<String>>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get_raw(key)?.is_some())
    }
}

/// Write access to one table
pub trait KvWrite: KvRead {
    fn put_raw(&mut self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Returns whether the key existed
    fn delete_raw(&mut self, key: &str) -> StoreResult<bool>;

    /// Delete every key starting with `prefix`, returning how many were removed
    fn delete_prefix(&mut self, prefix: &str) -> StoreResult<usize> {
        let keys: Vec<String> = self
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        for key in &keys {
            self.delete_raw(key)?;
        }
        Ok(keys.len())
    }
}

impl<T> KvRead for T
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.get(key)?.map(|v| v.value().to_vec()))
    }

    fn first_key_from(&self, from: &str) -> StoreResult<Option<String>> {
        match self.range(from..)?.next() {
            Some(entry) => {
                let (k, _) = entry?;
                Ok(Some(k.value().to_string()))
            }
            None => Ok(None),
        }
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let mut result = Vec::new();
        for entry in self.range(prefix..)? {
            let (k, v) = entry?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            result.push((key.to_string(), v.value().to_vec()));
        }
        Ok(result)
    }
}

impl KvWrite for Table<'_, &'static str, &'static [u8]> {
    fn put_raw(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.insert(key, value)?;
        Ok(())
    }

    fn delete_raw(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.remove(key)?.is_some())
    }
}

pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;
    use redb::Database;
    use tempfile::TempDir;

    #[test]
    fn test_prefix_scan_and_delete() {
        let dir = TempDir::new().unwrap();
        let db = Database::create(dir.path().join("kv.db")).unwrap();
        let wtx = db.begin_write().unwrap();
        {
            let mut table = wtx.open_table(tables::CATALOG).unwrap();
            table.put_raw("a\0", b"").unwrap();
            table.put_raw("a\0x", b"1").unwrap();
            table.put_raw("a\0y", b"2").unwrap();
            table.put_raw("b\0", b"").unwrap();

            let scanned = table.scan_prefix("a\0").unwrap();
            assert_eq!(scanned.len(), 3);
            assert_eq!(scanned[1], ("a\0x".to_string(), b"1".to_vec()));

            assert_eq!(table.first_key_from("a\u{1}").unwrap().as_deref(), Some("b\0"));
            assert_eq!(table.first_key_from("c").unwrap(), None);

            assert_eq!(table.delete_prefix("a\0").unwrap(), 3);
            assert!(!table.contains("a\0x").unwrap());
            assert!(table.contains("b\0").unwrap());
            assert!(!table.delete_raw("a\0").unwrap());
        }
        wtx.commit().unwrap();

        let rtx = db.begin_read().unwrap();
        let table = rtx.open_table(tables::CATALOG).unwrap();
        assert_eq!(table.get_raw("b\0").unwrap(), Some(Vec::new()));
        assert_eq!(table.get_raw("a\0y").unwrap(), None);
    }
}
