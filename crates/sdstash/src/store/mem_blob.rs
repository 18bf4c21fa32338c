use super::blob::{new_filename, BlobStore};
use crate::error::{Result, StashError};
use crate::model::GeneratedImage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory blob store for testing. Keeps the encoded PNG bytes, so metadata
/// embedding is exercised the same way as on disk.
#[derive(Default)]
pub struct MemBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    simulate_write_error: AtomicBool,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.blobs.lock().contains_key(filename)
    }
}

impl BlobStore for MemBlobStore {
    fn put(&self, image: &GeneratedImage, parameters: Option<&str>) -> Result<String> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(StashError::BlobStore("Simulated write error".to_string()));
        }
        let filename = new_filename();
        let png = image
            .encode_png(parameters)
            .map_err(|e| StashError::BlobStore(format!("{}: {}", filename, e)))?;
        self.blobs.lock().insert(filename.clone(), png);
        Ok(filename)
    }

    fn get(&self, filename: &str) -> Result<GeneratedImage> {
        let blobs = self.blobs.lock();
        let bytes = blobs
            .get(filename)
            .ok_or_else(|| StashError::BlobNotFound(filename.to_string()))?;
        GeneratedImage::from_png(bytes)
    }
}
