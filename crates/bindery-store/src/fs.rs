//! Filesystem and archive collaborators.
//!
//! The store never walks the library itself. It only checks whether known
//! files still exist, reads custom cover images, and asks an archive reader
//! for embedded cover pages.

use bindery_common::Archive;
use std::io;
use std::path::Path;

/// Existence checks and whole-file access on the host filesystem
pub trait FileProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Remove a file. Implementations may also tidy an emptied parent directory.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Reads single members out of an archive
pub trait ArchiveReader: Send + Sync {
    fn read_member(&self, archive: &Archive, member: &str) -> io::Result<Vec<u8>>;
}

/// `FileProbe` backed by `std::fs`
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

impl FileProbe for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)?;
        if let Some(parent) = path.parent() {
            let empty = std::fs::read_dir(parent).is_ok_and(|mut d| d.next().is_none());
            if empty {
                let _ = std::fs::remove_dir(parent);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_fs() {
        let dir = TempDir::new().unwrap();
        let covers = dir.path().join("covers");
        std::fs::create_dir_all(&covers).unwrap();
        let cover = covers.join("a.png");
        std::fs::write(&cover, b"png").unwrap();

        let fs = LocalFs;
        assert!(fs.exists(&cover));
        assert_eq!(fs.read(&cover).unwrap(), b"png");

        fs.remove(&cover).unwrap();
        assert!(!fs.exists(&cover));
        assert!(!covers.exists());
        assert!(dir.path().exists());
        assert!(fs.remove(&cover).is_err());
    }
}
