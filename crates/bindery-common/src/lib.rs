//! Bindery Common - Shared types and utilities
//!
//! This crate provides the domain types shared by the catalog store and its
//! consumers: library entities, users and reading progress, download records,
//! natural ordering, identifier derivation and configuration.

pub mod config;
pub mod download;
pub mod error;
pub mod ids;
pub mod natural;
pub mod types;
pub mod user;

pub use config::Config;
pub use download::{Download, DownloadStatus};
pub use error::{Error, Result};
pub use ids::{hash_id, hash_password};
pub use natural::natural_cmp;
pub use types::*;
pub use user::{CatalogProgress, EntryProgress, Role, SeriesProgress, User};
