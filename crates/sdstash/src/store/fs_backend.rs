use super::atomic_write;
use super::backend::RecordBackend;
use super::table::Table;
use crate::error::Result;
use crate::model::ImageRecord;
use crate::tags::TagStat;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const RECORDS_FILE: &str = "records.json";
pub const TAGS_FILE: &str = "tags.json";

pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records_path(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    pub fn tags_path(&self) -> PathBuf {
        self.root.join(TAGS_FILE)
    }

    fn load_table<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        let table: Table = serde_json::from_str(&content)?;
        table.into_items()
    }

    fn save_table<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        let table = Table::from_items(items)?;
        let content = serde_json::to_vec(&table)?;
        atomic_write(path, &content)
    }
}

impl RecordBackend for FsBackend {
    fn load_records(&self) -> Result<Vec<ImageRecord>> {
        self.load_table(&self.records_path())
    }

    fn save_records(&self, records: &[ImageRecord]) -> Result<()> {
        self.save_table(&self.records_path(), records)
    }

    fn load_tags(&self) -> Result<Vec<TagStat>> {
        self.load_table(&self.tags_path())
    }

    fn save_tags(&self, tags: &[TagStat]) -> Result<()> {
        self.save_table(&self.tags_path(), tags)
    }
}
