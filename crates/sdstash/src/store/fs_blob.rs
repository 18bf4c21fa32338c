use super::atomic_write;
use super::blob::{is_plain_filename, new_filename, BlobStore};
use crate::error::{Result, StashError};
use crate::model::GeneratedImage;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Images on disk, bucketed by the first 8 characters of the filename.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Opens the store, creating the root directory if needed.
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .map_err(|e| StashError::BlobStore(format!("{}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `filename` lives: `<root>/<first 8 chars of stem>/<filename>`.
    pub fn blob_path(&self, filename: &str) -> PathBuf {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        let prefix: String = stem.chars().take(8).collect();
        self.root.join(prefix).join(filename)
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, image: &GeneratedImage, parameters: Option<&str>) -> Result<String> {
        let filename = new_filename();
        let png = image
            .encode_png(parameters)
            .map_err(|e| StashError::BlobStore(format!("{}: {}", filename, e)))?;
        let path = self.blob_path(&filename);
        atomic_write(&path, &png)
            .map_err(|e| StashError::BlobStore(format!("{}: {}", path.display(), e)))?;
        Ok(filename)
    }

    fn get(&self, filename: &str) -> Result<GeneratedImage> {
        if !is_plain_filename(filename) {
            return Err(StashError::BlobNotFound(filename.to_string()));
        }
        let path = self.blob_path(filename);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StashError::BlobNotFound(filename.to_string()),
            _ => StashError::BlobStore(format!("{}: {}", path.display(), e)),
        })?;
        GeneratedImage::from_png(&bytes)
    }
}
