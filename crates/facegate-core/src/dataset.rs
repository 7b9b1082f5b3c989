//! Dataset directory → gallery.
//!
//! The dataset is a flat directory of pictures named `<name>_<id>.<ext>`.
//! Rebuilding re-encodes only the pictures whose content changed since
//! the previous gallery was written.

use crate::analyzer::{AnalyzeError, FaceEncoder};
use crate::gallery::{Gallery, GalleryEntry};
use crate::types::Identity;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("not a supported picture (jpg, jpeg, png): {0}")]
    UnsupportedImage(PathBuf),
    #[error("invalid name or id {0:?}: must be non-empty and must not contain '/'")]
    InvalidIdentity(String),
    #[error("no face found in {0}")]
    NoFace(PathBuf),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
}

/// Counters from one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Pictures run through the encoder.
    pub encoded: usize,
    /// Pictures whose embedding was carried over unchanged.
    pub reused: usize,
    /// Pictures ignored: bad file name, unreadable, no face, duplicate id.
    pub skipped: usize,
}

/// `true` for jpg / jpeg / png paths, case-insensitive.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ok| e.eq_ignore_ascii_case(ok)))
        .unwrap_or(false)
}

/// Split a file stem `<name>_<id>` on its last underscore.
pub fn parse_identity(stem: &str) -> Option<Identity> {
    let (name, id) = stem.rsplit_once('_')?;
    let (name, id) = (name.trim(), id.trim());
    if name.is_empty() || id.is_empty() {
        return None;
    }
    Some(Identity::new(name, id))
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Rebuild the gallery from every picture in `dataset_dir`.
///
/// Files are visited in name order; when two pictures carry the same id
/// the first one wins. An entry is carried over from `previous` only when
/// its picture, name and embedding model version are all unchanged.
pub fn build_dataset<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    dataset_dir: &Path,
    previous: &Gallery,
) -> Result<(Gallery, BuildReport), DatasetError> {
    let io_err = |source| DatasetError::Io { path: dataset_dir.to_path_buf(), source };

    let mut files: Vec<PathBuf> = std::fs::read_dir(dataset_dir)
        .map_err(io_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    files.sort();

    tracing::info!(dir = %dataset_dir.display(), pictures = files.len(), "rebuilding dataset");

    let mut gallery = Gallery::new();
    let mut report = BuildReport::default();

    for path in files {
        let Some(identity) = path.file_stem().and_then(|s| s.to_str()).and_then(parse_identity) else {
            tracing::warn!(path = %path.display(), "file name is not <name>_<id>; skipping");
            report.skipped += 1;
            continue;
        };

        if gallery.find(&identity.id).is_some() {
            tracing::warn!(path = %path.display(), id = %identity.id, "duplicate id; skipping");
            report.skipped += 1;
            continue;
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read picture; skipping");
                report.skipped += 1;
                continue;
            }
        };
        let digest = sha256_hex(&bytes);

        if let Some(prev) = previous.find(&identity.id) {
            if prev.source_sha256 == digest
                && prev.name == identity.name
                && prev.embedding.model_version.as_deref() == encoder.model_version()
            {
                gallery.upsert(prev.clone());
                report.reused += 1;
                continue;
            }
        }

        match encode_picture(encoder, &path, &bytes, identity, digest) {
            Ok(entry) => {
                gallery.upsert(entry);
                report.encoded += 1;
            }
            Err(DatasetError::Analyze(e)) => return Err(DatasetError::Analyze(e)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping picture");
                report.skipped += 1;
            }
        }
    }

    tracing::info!(
        entries = gallery.len(),
        encoded = report.encoded,
        reused = report.reused,
        skipped = report.skipped,
        "dataset rebuilt"
    );

    Ok((gallery, report))
}

/// Copy a picture into the dataset as `<name>_<id>.<ext>` and enroll it.
///
/// Surrounding whitespace is trimmed from the name and id.
/// Replaces any gallery entry with the same id. The previous picture for
/// that id is removed from the dataset directory when its file name differs.
pub fn enroll_image<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    dataset_dir: &Path,
    gallery: &mut Gallery,
    picture: &Path,
    identity: Identity,
) -> Result<GalleryEntry, DatasetError> {
    // Match what `parse_identity` reads back from the file name.
    let identity = Identity::new(identity.name.trim(), identity.id.trim());
    for part in [&identity.name, &identity.id] {
        if part.trim().is_empty() || part.contains('/') || part.contains('\\') {
            return Err(DatasetError::InvalidIdentity(part.clone()));
        }
    }
    // The id is everything after the last underscore of the file stem.
    if identity.id.contains('_') {
        return Err(DatasetError::InvalidIdentity(identity.id));
    }
    if !is_image_file(picture) {
        return Err(DatasetError::UnsupportedImage(picture.to_path_buf()));
    }

    let bytes = std::fs::read(picture)
        .map_err(|source| DatasetError::Io { path: picture.to_path_buf(), source })?;
    let digest = sha256_hex(&bytes);

    let ext = picture
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "jpg".to_string());
    let target = dataset_dir.join(format!("{}_{}.{ext}", identity.name, identity.id));

    let entry = encode_picture(encoder, &target, &bytes, identity, digest)?;

    std::fs::create_dir_all(dataset_dir)
        .map_err(|source| DatasetError::Io { path: dataset_dir.to_path_buf(), source })?;
    std::fs::write(&target, &bytes).map_err(|source| DatasetError::Io { path: target.clone(), source })?;

    if let Some(old) = gallery.upsert(entry.clone()) {
        if old.source != entry.source {
            let stale = dataset_dir.join(&old.source);
            if let Err(e) = std::fs::remove_file(&stale) {
                tracing::warn!(path = %stale.display(), error = %e, "could not remove replaced picture");
            }
        }
    }

    tracing::info!(name = %entry.name, id = %entry.id, source = %entry.source, "enrolled");
    Ok(entry)
}

/// Remove an identity from the gallery and delete its dataset picture.
pub fn remove_identity(dataset_dir: &Path, gallery: &mut Gallery, id: &str) -> Option<GalleryEntry> {
    let removed = gallery.remove(id)?;
    let picture = dataset_dir.join(&removed.source);
    match std::fs::remove_file(&picture) {
        Ok(()) => tracing::info!(path = %picture.display(), "removed dataset picture"),
        Err(e) => tracing::warn!(path = %picture.display(), error = %e, "could not remove dataset picture"),
    }
    Some(removed)
}

/// Decode `bytes` and embed the most confident face.
fn encode_picture<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    path: &Path,
    bytes: &[u8],
    identity: Identity,
    digest: String,
) -> Result<GalleryEntry, DatasetError> {
    let image = image::load_from_memory(bytes)
        .map_err(|source| DatasetError::Image { path: path.to_path_buf(), source })?
        .to_rgb8();

    let face = encoder
        .encode(&image)?
        .into_iter()
        .next()
        .ok_or_else(|| DatasetError::NoFace(path.to_path_buf()))?;

    tracing::debug!(path = %path.display(), confidence = face.bbox.confidence, "encoded dataset picture");

    Ok(GalleryEntry {
        name: identity.name,
        id: identity.id,
        source: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        source_sha256: digest,
        embedding: face.embedding,
        created_at: now_rfc3339(),
    })
}
