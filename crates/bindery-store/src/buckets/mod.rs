//! Typed views over the store's namespaces.
//!
//! Every view borrows a table from an open transaction. Read accessors are
//! available on any readable table, mutators only inside a write
//! transaction.

mod catalog;
mod downloads;
mod entry;
pub mod raw;
mod series;
mod users;

pub use catalog::CatalogBucket;
pub use downloads::DownloadsBucket;
pub use entry::{EntryBucket, PagesBucket};
pub use raw::Bucket;
pub use series::SeriesBucket;
pub use users::{UserBucket, UsersBucket};
