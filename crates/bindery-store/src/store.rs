//! Persistent catalog store backed by redb.
//!
//! Every public operation is exactly one transaction: reads run in a read
//! transaction, mutations in one write transaction that commits only if the
//! body succeeds. Bulk jobs span many transactions and serialize against
//! each other through a `PauseController` passed in by the caller.

use crate::buckets::{CatalogBucket, DownloadsBucket, UsersBucket};
use crate::error::StoreResult;
use crate::fs::{ArchiveReader, FileProbe, LocalFs};
use crate::kv::KvRead;
use crate::tables;
use crate::thumbnail::{ImageThumbnailer, Thumbnailer};
use redb::{Database, ReadOnlyTable, Table};
use std::path::Path;
use std::sync::Arc;

/// The three root tables opened by one transaction
pub struct Tables<T> {
    pub catalog: T,
    pub users: T,
    pub downloads: T,
}

pub type ReadTables = Tables<ReadOnlyTable<&'static str, &'static [u8]>>;
pub type WriteTables<'txn> = Tables<Table<'txn, &'static str, &'static [u8]>>;

impl<T: KvRead> Tables<T> {
    pub fn catalog(&mut self) -> CatalogBucket<'_, T> {
        CatalogBucket::new(&mut self.catalog)
    }

    pub fn users(&mut self) -> UsersBucket<'_, T> {
        UsersBucket::new(&mut self.users)
    }

    pub fn downloads(&mut self) -> DownloadsBucket<'_, T> {
        DownloadsBucket::new(&mut self.downloads)
    }
}

/// Persistent catalog store
pub struct Store {
    db: Database,
    pub(crate) fs: Arc<dyn FileProbe>,
    pub(crate) archives: Option<Arc<dyn ArchiveReader>>,
    pub(crate) thumbnailer: Arc<dyn Thumbnailer>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::CATALOG)?;
            let _t = write_txn.open_table(tables::USERS)?;
            let _t = write_txn.open_table(tables::DOWNLOADS)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            fs: Arc::new(LocalFs),
            archives: None,
            thumbnailer: Arc::new(ImageThumbnailer::default()),
        })
    }

    #[must_use]
    pub fn with_file_probe(mut self, fs: Arc<dyn FileProbe>) -> Self {
        self.fs = fs;
        self
    }

    /// Reader used to pull embedded covers out of archives
    #[must_use]
    pub fn with_archive_reader(mut self, reader: Arc<dyn ArchiveReader>) -> Self {
        self.archives = Some(reader);
        self
    }

    #[must_use]
    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        self.thumbnailer = thumbnailer;
        self
    }

    /// Run `f` against a consistent snapshot
    pub fn view<R>(&self, f: impl FnOnce(&mut ReadTables) -> StoreResult<R>) -> StoreResult<R> {
        let read_txn = self.db.begin_read()?;
        let mut tables = Tables {
            catalog: read_txn.open_table(tables::CATALOG)?,
            users: read_txn.open_table(tables::USERS)?,
            downloads: read_txn.open_table(tables::DOWNLOADS)?,
        };
        f(&mut tables)
    }

    /// Run `f` in one write transaction. Nothing is committed if `f` fails.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut WriteTables<'_>) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut tables = Tables {
                catalog: write_txn.open_table(tables::CATALOG)?,
                users: write_txn.open_table(tables::USERS)?,
                downloads: write_txn.open_table(tables::DOWNLOADS)?,
            };
            f(&mut tables)?
        };
        write_txn.commit()?;
        Ok(result)
    }
}
