//! One-time metadata backups.
//!
//! Before a refresh first mutates a book, its pre-refresh metadata (and cover
//! file, when one exists) is snapshotted to disk. The backup is taken at most
//! once per book: later refreshes never overwrite it, so it always preserves
//! the state before any reconciliation touched the book.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::model::Book;

/// Directory-backed store of per-book metadata backups.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn metadata_path(&self, book_id: i64) -> PathBuf {
        self.dir.join(format!("{book_id}.json"))
    }

    /// Whether a backup already exists for this book.
    pub fn exists(&self, book_id: i64) -> bool {
        self.metadata_path(book_id).exists()
    }

    /// Snapshot the book's current metadata unless a backup already exists.
    ///
    /// Returns true when a new backup was written. The JSON file is written
    /// via a temp file and rename so a crash never leaves a half-written
    /// backup behind.
    pub fn create_if_absent(&self, book: &Book) -> io::Result<bool> {
        let path = self.metadata_path(book.id);
        if path.exists() {
            debug!(book_id = book.id, "backup already exists, keeping original");
            return Ok(false);
        }

        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(&book.metadata)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &path)?;

        if let Some(cover) = &book.metadata.cover_path {
            self.backup_cover(book.id, Path::new(cover))?;
        }

        info!(book_id = book.id, path = %path.display(), "backed up metadata");
        Ok(true)
    }

    /// Copy the book's current cover file alongside the metadata backup.
    /// A missing source file is not an error: the path may be stale.
    fn backup_cover(&self, book_id: i64, cover: &Path) -> io::Result<()> {
        if !cover.exists() {
            debug!(book_id, cover = %cover.display(), "cover path is stale, skipping backup");
            return Ok(());
        }

        let extension = cover
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        let dest = self.dir.join(format!("{book_id}_cover.{extension}"));
        fs::copy(cover, dest)?;
        Ok(())
    }

    /// Read a backup back, if one exists.
    pub fn load(&self, book_id: i64) -> io::Result<Option<crate::model::BookMetadata>> {
        let path = self.metadata_path(book_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        let metadata = serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(metadata))
    }
}
