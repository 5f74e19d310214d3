//! Redb table definitions for the catalog store.
//!
//! Each root namespace is one table. Nested namespaces are encoded in the
//! key: path segments are joined with `\0`, and a namespace's marker key is
//! its own prefix (see `buckets::raw`).

use redb::TableDefinition;

// Key: "<sid>\0..." series namespaces plus the root leaves "catalog" and "modtime"
pub const CATALOG: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog");
// Key: "<uid>\0<field>"
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
// Key: zero padded hex sequence id, Value: bincode-encoded Download
pub const DOWNLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("downloads");
