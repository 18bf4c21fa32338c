use crate::error::Result;
use crate::model::GeneratedImage;

/// Raw image storage addressed by generated filenames.
pub trait BlobStore: Send + Sync {
    /// Store an image, embedding `parameters` as its generation text when given.
    /// Returns the new filename, unique within this store.
    fn put(&self, image: &GeneratedImage, parameters: Option<&str>) -> Result<String>;

    /// Load a stored image by filename.
    fn get(&self, filename: &str) -> Result<GeneratedImage>;
}

/// A new `<uuid>.png` filename.
pub(crate) fn new_filename() -> String {
    format!("{}.png", uuid::Uuid::new_v4().simple())
}

/// Rejects names that could escape the storage root.
pub(crate) fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(|c: char| c == '/' || c == '\\')
        && !name.contains("..")
}
