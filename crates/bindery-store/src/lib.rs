//! Bindery Store - Persistent catalog store
//!
//! This crate materializes a media library (catalog, series, entries, pages)
//! together with users, reading progress and download records in an embedded
//! redb database, and keeps it consistent across rescans, metadata overrides
//! and filesystem changes.

pub mod buckets;
pub mod error;
pub mod fs;
pub mod index;
pub mod kv;
pub mod pause;
pub mod store;
pub mod tables;
pub mod thumbnail;

mod accounts;
mod covers;
mod downloads;
mod dump;
mod library;
mod missing;
mod populate;
mod progress;

// Re-exports
pub use covers::ImageData;
pub use error::{StoreError, StoreResult};
pub use fs::{ArchiveReader, FileProbe, LocalFs};
pub use index::OrderedIndex;
pub use pause::{PauseController, PauseGuard};
pub use progress::EntryProgressUpdate;
pub use store::{Store, Tables};
pub use thumbnail::{ImageThumbnailer, Thumbnailer};
