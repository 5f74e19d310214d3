//! Error types for catalog store operations.

use std::fmt::Write;
use thiserror::Error;

/// Error type for catalog store operations
#[derive(Debug, Error)]
pub enum StoreError {
    // Engine and I/O failures, these abort the enclosing transaction
    #[error("redb error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // Not found
    #[error("series does not exist: {0}")]
    SeriesNotFound(String),
    #[error("entry does not exist: {sid}/{eid}")]
    EntryNotFound { sid: String, eid: String },
    #[error("catalog entry does not exist: {0}")]
    CatalogEntryNotFound(String),
    #[error("entry metadata does not exist: {sid}/{eid}")]
    EntryMetadataNotFound { sid: String, eid: String },
    #[error("page {num} does not exist: {sid}/{eid}")]
    PageNotFound { sid: String, eid: String, num: usize },
    #[error("user does not exist: {0}")]
    UserNotFound(String),
    #[error("progress does not exist: {uid} {sid}")]
    ProgressNotFound { uid: String, sid: String },
    #[error("archive has no embedded cover: {0}")]
    EmbeddedCoverNotFound(String),

    // Preconditions, rejected without mutating state
    #[error("series has no entries: {0}")]
    NoEntries(String),
    #[error("duplicate series title: {0}")]
    DuplicateSeries(String),
    #[error("duplicate entry title in {series}: {title}")]
    DuplicateEntry { series: String, title: String },
    #[error("user already exists: {0}")]
    UserExists(String),
    #[error("not enough admins")]
    NotEnoughAdmins,
    #[error("cover is empty: {0}")]
    CoverEmpty(String),
    #[error("thumbnail is empty: {0}")]
    ThumbnailEmpty(String),
    #[error("no archive reader registered")]
    ArchiveReaderUnavailable,
    #[error("invalid key name: {0:?}")]
    InvalidName(String),

    #[error("thumbnail error: {0}")]
    Thumbnail(String),

    #[error(transparent)]
    Common(#[from] bindery_common::Error),

    /// Per-item failures collected by a bulk job
    #[error("{}", describe_aggregate(.0))]
    Aggregate(Vec<StoreError>),
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<image::ImageError> for StoreError {
    fn from(e: image::ImageError) -> Self {
        Self::Thumbnail(e.to_string())
    }
}

impl StoreError {
    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SeriesNotFound(_)
                | Self::EntryNotFound { .. }
                | Self::CatalogEntryNotFound(_)
                | Self::EntryMetadataNotFound { .. }
                | Self::PageNotFound { .. }
                | Self::UserNotFound(_)
                | Self::ProgressNotFound { .. }
                | Self::EmbeddedCoverNotFound(_)
        )
    }

    /// Check if the operation was rejected before touching the store
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoEntries(_)
                | Self::DuplicateSeries(_)
                | Self::DuplicateEntry { .. }
                | Self::UserExists(_)
                | Self::NotEnoughAdmins
                | Self::CoverEmpty(_)
                | Self::ThumbnailEmpty(_)
                | Self::ArchiveReaderUnavailable
                | Self::InvalidName(_)
        )
    }

    /// Collapse collected per-item errors. `None` when nothing failed.
    #[must_use]
    pub fn aggregate(mut errors: Vec<Self>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Aggregate(errors)),
        }
    }
}

fn describe_aggregate(errors: &[StoreError]) -> String {
    let mut out = format!("{} errors", errors.len());
    for e in errors {
        let _ = write!(out, "; {e}");
    }
    out
}

pub type StoreResult<T> = Result<T, StoreError>;
