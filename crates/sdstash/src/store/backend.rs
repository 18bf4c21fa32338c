use crate::error::Result;
use crate::model::ImageRecord;
use crate::tags::TagStat;

/// Durable storage for the record list and the tag-count index.
///
/// The record store owns ordering and consistency; a backend only moves the two
/// collections in and out of storage. Loading from an empty location yields empty
/// collections, not an error.
pub trait RecordBackend: Send + Sync {
    // --- Records ---

    /// Load the persisted records (records.json)
    fn load_records(&self) -> Result<Vec<ImageRecord>>;

    /// Replace the persisted records.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn save_records(&self, records: &[ImageRecord]) -> Result<()>;

    // --- Tag Index ---

    /// Load the persisted tag index (tags.json)
    fn load_tags(&self) -> Result<Vec<TagStat>>;

    /// Replace the persisted tag index. Same atomicity rule as `save_records`.
    fn save_tags(&self, tags: &[TagStat]) -> Result<()>;
}

impl<B: RecordBackend + ?Sized> RecordBackend for std::sync::Arc<B> {
    fn load_records(&self) -> Result<Vec<ImageRecord>> {
        (**self).load_records()
    }

    fn save_records(&self, records: &[ImageRecord]) -> Result<()> {
        (**self).save_records(records)
    }

    fn load_tags(&self) -> Result<Vec<TagStat>> {
        (**self).load_tags()
    }

    fn save_tags(&self, tags: &[TagStat]) -> Result<()> {
        (**self).save_tags(tags)
    }
}
