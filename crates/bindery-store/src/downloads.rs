//! Download records written by the chapter download worker.

use crate::error::StoreResult;
use crate::store::Store;
use bindery_common::{Download, DownloadStatus};
use tracing::debug;

impl Store {
    /// Record a download. Returns its sequence id.
    pub fn add_download(&self, download: &Download) -> StoreResult<u64> {
        let id = self.update(|t| t.downloads().add(download))?;
        debug!(id, series = %download.series, status = %download.status, "recorded download");
        Ok(id)
    }

    pub fn update_download(&self, id: u64, download: &Download) -> StoreResult<()> {
        self.update(|t| t.downloads().update(id, download))
    }

    /// Every download, newest first
    pub fn downloads(&self) -> StoreResult<Vec<(u64, Download)>> {
        let mut downloads = self.view(|t| t.downloads().list())?;
        downloads.reverse();
        Ok(downloads)
    }

    /// Delete every download that reached a final state. Returns how many
    /// were removed.
    pub fn clear_finished_downloads(&self) -> StoreResult<usize> {
        self.update(|t| {
            let mut downloads = t.downloads();
            let mut removed = 0;
            for (id, download) in downloads.list()? {
                if download.is_finished() && downloads.delete(id)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    /// Remove failed downloads and hand them back for a retry
    pub fn take_failed_downloads(&self) -> StoreResult<Vec<Download>> {
        self.update(|t| {
            let mut downloads = t.downloads();
            let mut failed = Vec::new();
            for (id, download) in downloads.list()? {
                if download.status == DownloadStatus::Failed {
                    downloads.delete(id)?;
                    failed.push(download);
                }
            }
            Ok(failed)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::store::testutil::*;
    use bindery_common::{Download, DownloadStatus};

    fn download(chapter: &str, status: DownloadStatus) -> Download {
        let mut download = Download::new("Akira", "mangadex", 20);
        download.chapter = Some(chapter.to_string());
        download.status = status;
        download
    }

    #[test]
    fn test_downloads_newest_first() {
        let fx = fixture();
        let first = fx.store.add_download(&download("1", DownloadStatus::Queued)).unwrap();
        let second = fx.store.add_download(&download("2", DownloadStatus::Queued)).unwrap();
        assert!(second > first);

        let chapters: Vec<_> = fx
            .store
            .downloads()
            .unwrap()
            .into_iter()
            .map(|(_, d)| d.chapter.unwrap_or_default())
            .collect();
        assert_eq!(chapters, ["2", "1"]);
    }

    #[test]
    fn test_update_download() {
        let fx = fixture();
        let mut record = download("1", DownloadStatus::Queued);
        let id = fx.store.add_download(&record).unwrap();

        record.start();
        record.current_page = 7;
        fx.store.update_download(id, &record).unwrap();

        let (stored_id, stored) = fx.store.downloads().unwrap().remove(0);
        assert_eq!(stored_id, id);
        assert_eq!(stored.status, DownloadStatus::Started);
        assert_eq!(stored.current_page, 7);
    }

    #[test]
    fn test_clear_finished_and_take_failed() {
        let fx = fixture();
        for (chapter, status) in [
            ("1", DownloadStatus::Finished),
            ("2", DownloadStatus::Failed),
            ("3", DownloadStatus::Started),
            ("4", DownloadStatus::Exists),
            ("5", DownloadStatus::Failed),
        ] {
            fx.store.add_download(&download(chapter, status)).unwrap();
        }

        let failed = fx.store.take_failed_downloads().unwrap();
        let chapters: Vec<_> = failed.iter().filter_map(|d| d.chapter.as_deref()).collect();
        assert_eq!(chapters, ["2", "5"]);

        assert_eq!(fx.store.clear_finished_downloads().unwrap(), 2);
        let left = fx.store.downloads().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].1.status, DownloadStatus::Started);
    }
}
