use super::backend::RecordBackend;
use super::table::Table;
use crate::error::{Result, StashError};
use crate::model::ImageRecord;
use crate::tags::TagStat;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory record backend for testing.
///
/// Collections are kept in their [`Table`] form, so a save/load cycle goes through
/// the same null handling as the on-disk files.
#[derive(Default)]
pub struct MemBackend {
    records: Mutex<Option<Table>>,
    tags: Mutex<Option<Table>>,
    saves: AtomicUsize,
    simulate_write_error: AtomicBool,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Number of successful `save_records` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(StashError::Persistence("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl RecordBackend for MemBackend {
    fn load_records(&self) -> Result<Vec<ImageRecord>> {
        match self.records.lock().clone() {
            Some(table) => table.into_items(),
            None => Ok(Vec::new()),
        }
    }

    fn save_records(&self, records: &[ImageRecord]) -> Result<()> {
        self.check_writable()?;
        *self.records.lock() = Some(Table::from_items(records)?);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_tags(&self) -> Result<Vec<TagStat>> {
        match self.tags.lock().clone() {
            Some(table) => table.into_items(),
            None => Ok(Vec::new()),
        }
    }

    fn save_tags(&self, tags: &[TagStat]) -> Result<()> {
        self.check_writable()?;
        *self.tags.lock() = Some(Table::from_items(tags)?);
        Ok(())
    }
}
