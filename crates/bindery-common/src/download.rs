//! Chapter download records.
//!
//! The acquisition worker lives outside this workspace; it records the state
//! of each download here so the catalog can list and retry them.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[default]
    Queued,
    Started,
    Finished,
    Cancelled,
    Exists,
    Failed,
}

impl DownloadStatus {
    /// Anything past `Started` is terminal
    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::Queued | Self::Started)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "Queued",
            Self::Started => "Started",
            Self::Finished => "Finished",
            Self::Cancelled => "Cancelled",
            Self::Exists => "Already Downloaded",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

impl FromStr for DownloadStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "started" => Ok(Self::Started),
            "finished" => Ok(Self::Finished),
            "cancelled" => Ok(Self::Cancelled),
            "exists" | "already downloaded" => Ok(Self::Exists),
            "failed" => Ok(Self::Failed),
            _ => Err(Error::UnknownDownloadStatus(s.to_string())),
        }
    }
}

/// A single chapter download
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    /// Series title the chapter is filed under
    pub series: String,
    /// Id of the chapter at the remote source
    pub source_id: String,
    pub chapter: Option<String>,
    pub volume: Option<String>,
    pub status: DownloadStatus,
    pub current_page: usize,
    pub total_pages: usize,
    pub started_at: Option<DateTime<Utc>>,
    /// Wall time taken once the download reaches a terminal state
    pub elapsed_ms: Option<i64>,
}

impl Download {
    #[must_use]
    pub fn new(series: &str, source_id: &str, total_pages: usize) -> Self {
        Self {
            series: series.to_string(),
            source_id: source_id.to_string(),
            chapter: None,
            volume: None,
            status: DownloadStatus::Queued,
            current_page: 0,
            total_pages,
            started_at: None,
            elapsed_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = DownloadStatus::Started;
        self.started_at = Some(Utc::now());
        self.elapsed_ms = None;
    }

    pub fn finish(&mut self, status: DownloadStatus) {
        self.status = status;
        if status == DownloadStatus::Exists {
            self.current_page = self.total_pages;
        }
        self.elapsed_ms = self
            .started_at
            .map(|start| (Utc::now() - start).num_milliseconds());
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Relative path the finished archive is written to
    #[must_use]
    pub fn file_path(&self) -> String {
        let chapter = self.chapter.as_deref().unwrap_or("0");
        match self.volume.as_deref() {
            Some(vol) if !vol.is_empty() => {
                format!("{}/Vol. {vol}/Ch. {chapter}.cbz", self.series)
            }
            _ => format!("{}/Ch. {chapter}.cbz", self.series),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!DownloadStatus::Queued.is_finished());
        assert!(!DownloadStatus::Started.is_finished());
        assert!(DownloadStatus::Failed.is_finished());
        assert!(DownloadStatus::Exists.is_finished());
        assert_eq!("already downloaded".parse::<DownloadStatus>().unwrap(), DownloadStatus::Exists);
    }

    #[test]
    fn test_download_lifecycle() {
        let mut dl = Download::new("Akira", "ch-1", 12);
        assert_eq!(dl.status, DownloadStatus::Queued);
        dl.start();
        assert!(dl.started_at.is_some());
        dl.finish(DownloadStatus::Exists);
        assert_eq!(dl.current_page, 12);
        assert!(dl.elapsed_ms.is_some());
        assert!(dl.is_finished());
    }

    #[test]
    fn test_file_path() {
        let mut dl = Download::new("Akira", "ch-1", 12);
        dl.chapter = Some("3".into());
        assert_eq!(dl.file_path(), "Akira/Ch. 3.cbz");
        dl.volume = Some("1".into());
        assert_eq!(dl.file_path(), "Akira/Vol. 1/Ch. 3.cbz");
    }
}
