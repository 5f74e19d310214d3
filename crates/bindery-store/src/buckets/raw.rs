//! Path-addressed namespaces over a flat ordered table.
//!
//! A namespace is identified by its prefix: the path segments each followed
//! by `\0`. The namespace exists iff its marker key (the prefix itself) is
//! present. Leaf values live at `prefix + leaf`, child namespaces at
//! `prefix + name + "\0"`. Deleting a namespace deletes its key range.
//!
//! A `Bucket` borrows the table mutably, so no handle can outlive the
//! transaction that opened the table.

use crate::error::{StoreError, StoreResult};
use crate::kv::{KvRead, KvWrite, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const SEP: char = '\0';
// Sorts directly after SEP, used to skip over a child's descendants
const SKIP: char = '\u{1}';

pub struct Bucket<'a, K: ?Sized> {
    kv: &'a mut K,
    prefix: String,
}

pub(crate) fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEP)
}

impl<'a, K: KvRead + ?Sized> Bucket<'a, K> {
    /// The root namespace of a table. Always exists.
    pub fn root(kv: &'a mut K) -> Self {
        Self {
            kv,
            prefix: String::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix of the namespace at `path` below this one, `None` if a segment is invalid
    fn path_prefix(&self, path: &[&str]) -> Option<String> {
        let mut prefix = self.prefix.clone();
        for name in path {
            if !valid_name(name) {
                return None;
            }
            prefix.push_str(name);
            prefix.push(SEP);
        }
        Some(prefix)
    }

    pub fn get_bytes(&self, leaf: &str) -> StoreResult<Option<Vec<u8>>> {
        self.kv.get_raw(&format!("{}{leaf}", self.prefix))
    }

    pub fn get<T: DeserializeOwned>(&self, leaf: &str) -> StoreResult<Option<T>> {
        self.get_at(&[], leaf)
    }

    /// Decode a leaf of the namespace at `path`
    pub fn get_at<T: DeserializeOwned>(&self, path: &[&str], leaf: &str) -> StoreResult<Option<T>> {
        let Some(prefix) = self.path_prefix(path) else {
            return Ok(None);
        };
        match self.kv.get_raw(&format!("{prefix}{leaf}"))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn has_path(&self, path: &[&str]) -> StoreResult<bool> {
        match self.path_prefix(path) {
            Some(prefix) => self.kv.contains(&prefix),
            None => Ok(false),
        }
    }

    pub fn has_child(&self, name: &str) -> StoreResult<bool> {
        self.has_path(&[name])
    }

    /// Handle to an existing namespace below this one
    pub fn descend(&mut self, path: &[&str]) -> StoreResult<Option<Bucket<'_, K>>> {
        let Some(prefix) = self.path_prefix(path) else {
            return Ok(None);
        };
        if !self.kv.contains(&prefix)? {
            return Ok(None);
        }
        Ok(Some(Bucket {
            kv: &mut *self.kv,
            prefix,
        }))
    }

    pub fn child(&mut self, name: &str) -> StoreResult<Option<Bucket<'_, K>>> {
        self.descend(&[name])
    }

    /// Names of the direct children of the namespace at `path`, in key order
    pub fn names_at(&self, path: &[&str]) -> StoreResult<Vec<String>> {
        let Some(base) = self.path_prefix(path) else {
            return Ok(Vec::new());
        };
        let mut names = Vec::new();
        let mut cursor = base.clone();
        while let Some(key) = self.kv.first_key_from(&cursor)? {
            let Some(rest) = key.strip_prefix(base.as_str()) else {
                break;
            };
            if let Some(pos) = rest.find(SEP) {
                let name = &rest[..pos];
                cursor = format!("{base}{name}{SKIP}");
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            } else {
                cursor = format!("{key}{SEP}");
            }
        }
        Ok(names)
    }

    pub fn child_names(&self) -> StoreResult<Vec<String>> {
        self.names_at(&[])
    }

    /// Leaf values stored directly in the namespace at `path`, in key order
    pub fn leaves_at(&self, path: &[&str]) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let Some(base) = self.path_prefix(path) else {
            return Ok(Vec::new());
        };
        Ok(self
            .kv
            .scan_prefix(&base)?
            .into_iter()
            .filter_map(|(key, value)| {
                let rest = &key[base.len()..];
                (!rest.is_empty() && !rest.contains(SEP)).then(|| (rest.to_string(), value))
            })
            .collect())
    }

    pub fn leaves(&self) -> StoreResult<Vec<(String, Vec<u8>)>> {
        self.leaves_at(&[])
    }
}

impl<K: KvWrite + ?Sized> Bucket<'_, K> {
    pub fn put_bytes(&mut self, leaf: &str, value: &[u8]) -> StoreResult<()> {
        let key = format!("{}{leaf}", self.prefix);
        self.kv.put_raw(&key, value)
    }

    pub fn put<T: Serialize + ?Sized>(&mut self, leaf: &str, value: &T) -> StoreResult<()> {
        self.put_bytes(leaf, &encode(value)?)
    }

    pub fn delete(&mut self, leaf: &str) -> StoreResult<bool> {
        let key = format!("{}{leaf}", self.prefix);
        self.kv.delete_raw(&key)
    }

    /// Create every namespace along `path` that is missing and return a
    /// handle to the last one
    pub fn create_path(&mut self, path: &[&str]) -> StoreResult<Bucket<'_, K>> {
        let mut prefix = self.prefix.clone();
        for name in path {
            if !valid_name(name) {
                return Err(StoreError::InvalidName((*name).to_string()));
            }
            prefix.push_str(name);
            prefix.push(SEP);
            if !self.kv.contains(&prefix)? {
                self.kv.put_raw(&prefix, &[])?;
            }
        }
        Ok(Bucket {
            kv: &mut *self.kv,
            prefix,
        })
    }

    pub fn create_child(&mut self, name: &str) -> StoreResult<Bucket<'_, K>> {
        self.create_path(&[name])
    }

    /// Remove the namespace at `path` and everything under it
    pub fn delete_path(&mut self, path: &[&str]) -> StoreResult<bool> {
        if path.is_empty() {
            return Ok(false);
        }
        match self.path_prefix(path) {
            Some(prefix) => Ok(self.kv.delete_prefix(&prefix)? > 0),
            None => Ok(false),
        }
    }

    pub fn delete_child(&mut self, name: &str) -> StoreResult<bool> {
        self.delete_path(&[name])
    }

    /// Copy a child namespace (and its descendants) to a new name
    pub fn copy_child(&mut self, from: &str, to: &str) -> StoreResult<()> {
        let (Some(src), Some(dst)) = (self.path_prefix(&[from]), self.path_prefix(&[to])) else {
            return Err(StoreError::InvalidName(format!("{from} -> {to}")));
        };
        for (key, value) in self.kv.scan_prefix(&src)? {
            let moved = format!("{dst}{}", &key[src.len()..]);
            self.kv.put_raw(&moved, &value)?;
        }
        Ok(())
    }
}
