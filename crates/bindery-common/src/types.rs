//! Core library types for Bindery
//!
//! This module defines the entities stored in the catalog: archives, pages,
//! covers, user metadata overrides and the ordered summaries served to
//! callers.

use crate::error::Error;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Image encoding of a page or cover
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    #[default]
    Jpeg,
    Png,
    Gif,
    Webp,
    Tiff,
    Bmp,
}

impl ImageType {
    /// MIME type served alongside image bytes
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
        }
    }

    /// Canonical file extension (without the dot)
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }

    /// Guess the image type from a file path's extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        path.extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| Error::UnknownImageType(path.display().to_string()))?
            .parse()
    }
}

impl FromStr for ImageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "webp" => Ok(Self::Webp),
            "tif" | "tiff" => Ok(Self::Tiff),
            "bmp" => Ok(Self::Bmp),
            _ => Err(Error::UnknownImageType(s.to_string())),
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Container format of an archive on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveType {
    Zip,
    Rar,
}

impl FromStr for ArchiveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "zip" | "cbz" => Ok(Self::Zip),
            "rar" | "cbr" => Ok(Self::Rar),
            _ => Err(Error::UnknownArchiveType(s.to_string())),
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => f.write_str("zip"),
            Self::Rar => f.write_str("rar"),
        }
    }
}

/// A page inside an archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Member path inside the archive
    pub path: String,
    pub image_type: ImageType,
}

/// An archive file backing one entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    /// Filename without extension
    pub title: String,
    /// Location on the filesystem
    pub path: PathBuf,
    pub archive_type: ArchiveType,
    /// Embedded cover page, if the parser found one
    pub cover: Option<Page>,
    pub mod_time: DateTime<Utc>,
}

impl Archive {
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}.{}", self.title, self.archive_type)
    }
}

/// Custom cover descriptor. No path means the embedded archive cover is used.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cover {
    pub path: Option<PathBuf>,
    pub image_type: ImageType,
}

impl Cover {
    /// Cover pointing at a custom image file
    pub fn custom(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let image_type = ImageType::from_path(&path)?;
        Ok(Self {
            path: Some(path),
            image_type,
        })
    }

    #[must_use]
    pub const fn is_custom(&self) -> bool {
        self.path.is_some()
    }
}

/// User-entered overrides for an entry. `None` means "not overridden".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub title: Option<String>,
    pub chapter: Option<u32>,
    pub volume: Option<u32>,
    pub author: Option<String>,
    pub date_released: Option<NaiveDate>,
}

impl EntryMetadata {
    /// Overwrite summary fields with every field that is overridden here.
    pub fn apply_to(&self, summary: &mut EntrySummary) {
        if let Some(title) = &self.title {
            summary.title.clone_from(title);
        }
        if self.chapter.is_some() {
            summary.chapter = self.chapter;
        }
        if self.volume.is_some() {
            summary.volume = self.volume;
        }
        if self.author.is_some() {
            summary.author.clone_from(&self.author);
        }
        if self.date_released.is_some() {
            summary.date_released = self.date_released;
        }
    }

    /// Snapshot of the user-facing fields of a summary.
    #[must_use]
    pub fn from_summary(summary: &EntrySummary) -> Self {
        Self {
            title: Some(summary.title.clone()),
            chapter: summary.chapter,
            volume: summary.volume,
            author: summary.author.clone(),
            date_released: summary.date_released,
        }
    }
}

/// User-entered overrides for a series. `None` means "not overridden".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date_released: Option<NaiveDate>,
}

impl SeriesMetadata {
    pub fn apply_to(&self, summary: &mut SeriesSummary) {
        if let Some(title) = &self.title {
            summary.title.clone_from(title);
        }
        if self.author.is_some() {
            summary.author.clone_from(&self.author);
        }
        if self.date_released.is_some() {
            summary.date_released = self.date_released;
        }
    }

    #[must_use]
    pub fn from_summary(summary: &SeriesSummary) -> Self {
        Self {
            title: Some(summary.title.clone()),
            author: summary.author.clone(),
            date_released: summary.date_released,
        }
    }
}

/// One slot of the Catalog index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// 1-based position in the catalog
    pub order: usize,
    pub hash: String,
    pub title: String,
    pub entries: usize,
    pub total_pages: usize,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub date_released: Option<NaiveDate>,
}

/// One slot of a series' EntriesMetadata index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// 1-based position in the series
    pub order: usize,
    pub hash: String,
    pub title: String,
    pub pages: usize,
    pub path: PathBuf,
    pub chapter: Option<u32>,
    pub volume: Option<u32>,
    pub author: Option<String>,
    pub date_released: Option<NaiveDate>,
}

/// An archive as produced by the filesystem parser
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// 1-based position within the parsed series
    pub order: usize,
    pub archive: Archive,
    #[serde(default)]
    pub metadata: EntryMetadata,
    pub pages: Vec<Page>,
}

/// A series directory as produced by the filesystem parser
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSeries {
    pub title: String,
    pub entries: Vec<ParsedEntry>,
}

impl ParsedSeries {
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.entries.iter().map(|e| e.pages.len()).sum()
    }
}

/// Kind of inconsistency found by the auditor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingKind {
    Series,
    Entry,
    Archive,
    Cover,
    Progress,
}

impl fmt::Display for MissingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Series => "Series",
            Self::Entry => "Entry",
            Self::Archive => "Archive",
            Self::Cover => "Cover",
            Self::Progress => "Progress",
        };
        f.write_str(s)
    }
}

/// A report row produced by the auditor. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingItem {
    pub kind: MissingKind,
    pub title: String,
    pub path: String,
}
