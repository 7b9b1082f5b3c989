//! Enrolled face gallery, persisted as a JSON file next to the dataset.

use crate::types::{Embedding, Identity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const GALLERY_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("gallery file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported gallery format version {0}")]
    UnsupportedVersion(u32),
}

/// One enrolled person: identity plus the embedding of their dataset image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub name: String,
    pub id: String,
    /// Dataset file the embedding came from (file name only).
    pub source: String,
    /// SHA-256 of the source file, used to skip re-encoding on rebuild.
    pub source_sha256: String,
    pub embedding: Embedding,
    pub created_at: String,
}

impl GalleryEntry {
    pub fn identity(&self) -> Identity {
        Identity::new(self.name.clone(), self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gallery {
    #[serde(default = "current_version")]
    version: u32,
    entries: Vec<GalleryEntry>,
}

fn current_version() -> u32 {
    GALLERY_FORMAT_VERSION
}

impl Default for Gallery {
    fn default() -> Self {
        Self::new()
    }
}

impl Gallery {
    pub fn new() -> Self {
        Self { version: GALLERY_FORMAT_VERSION, entries: Vec::new() }
    }

    /// Load a gallery file. A missing file is an empty gallery.
    pub fn load(path: &Path) -> Result<Self, GalleryError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no gallery file yet; starting empty");
                return Ok(Self::new());
            }
            Err(source) => return Err(GalleryError::Io { path: path.to_path_buf(), source }),
        };

        let gallery: Gallery = serde_json::from_str(&raw)
            .map_err(|source| GalleryError::Corrupt { path: path.to_path_buf(), source })?;
        if gallery.version != GALLERY_FORMAT_VERSION {
            return Err(GalleryError::UnsupportedVersion(gallery.version));
        }

        tracing::debug!(path = %path.display(), entries = gallery.len(), "gallery loaded");
        Ok(gallery)
    }

    /// Write the gallery atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), GalleryError> {
        let io_err = |source| GalleryError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|source| GalleryError::Corrupt { path: path.to_path_buf(), source })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;

        tracing::info!(path = %path.display(), entries = self.len(), "gallery saved");
        Ok(())
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn find(&self, id: &str) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Insert or replace the entry with the same id. Returns the replaced entry.
    pub fn upsert(&mut self, entry: GalleryEntry) -> Option<GalleryEntry> {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => Some(std::mem::replace(slot, entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<GalleryEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: &str) -> GalleryEntry {
        GalleryEntry {
            name: name.into(),
            id: id.into(),
            source: format!("{name}_{id}.jpg"),
            source_sha256: "00".into(),
            embedding: Embedding { values: vec![0.6, 0.8], model_version: Some("w600k_r50".into()) },
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = Gallery::load(&dir.path().join("gallery.json")).unwrap();
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/gallery.json");

        let mut gallery = Gallery::new();
        gallery.upsert(entry("Ada", "17"));
        gallery.upsert(entry("Grace", "42"));
        gallery.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let loaded = Gallery::load(&path).unwrap();
        assert_eq!(loaded, gallery);
        assert_eq!(loaded.find("42").map(|e| e.name.as_str()), Some("Grace"));
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let mut gallery = Gallery::new();
        assert!(gallery.upsert(entry("Ada", "17")).is_none());
        let old = gallery.upsert(entry("Ada Lovelace", "17")).unwrap();
        assert_eq!(old.name, "Ada");
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.find("17").unwrap().name, "Ada Lovelace");
    }

    #[test]
    fn test_remove() {
        let mut gallery = Gallery::new();
        gallery.upsert(entry("Ada", "17"));
        assert_eq!(gallery.remove("17").map(|e| e.id), Some("17".to_string()));
        assert!(gallery.remove("17").is_none());
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Gallery::load(&path), Err(GalleryError::Corrupt { .. })));
    }

    #[test]
    fn test_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        std::fs::write(&path, r#"{"version": 9, "entries": []}"#).unwrap();
        assert!(matches!(Gallery::load(&path), Err(GalleryError::UnsupportedVersion(9))));
    }
}
