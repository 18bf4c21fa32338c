//! # Configuration
//!
//! Sdstash configuration is managed by [`confique`], layered from environment
//! variables over an optional TOML file over compiled defaults.
//!
//! ## Available Settings
//!
//! | Key | Env | Default | Description |
//! |-----|-----|---------|-------------|
//! | `storage_dir` | `LOCAL_IMG_STORAGE_DIR` | `images` | Root of the image blob store |
//! | `records_dir` | `LOCAL_IMG_RECORDS_DIR` | `storage_dir` | Where `records.json` and `tags.json` live |
//! | `tags_info` | `SDSTASH_TAGS_INFO` | unset | Reference tag table used to resolve query tags |
//! | `general_tags` | `SDSTASH_GENERAL_TAGS` | unset | Descriptions for general tags |
//! | `extract_timeout_secs` | `SDSTASH_EXTRACT_TIMEOUT_SECS` | unset | Give up on the tagger after this long |
//!
//! Without `tags_info`, ingestion and listing still work; tag queries and tag
//! descriptions fail with `MissingReferenceDatabase`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use confique::Config;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StashError};

const DEFAULT_STORAGE_DIR: &str = "images";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StashConfig {
    /// Root directory of the image blob store.
    #[config(env = "LOCAL_IMG_STORAGE_DIR", default = "images")]
    pub storage_dir: PathBuf,

    /// Directory for the record and tag tables. Defaults to `storage_dir`.
    #[config(env = "LOCAL_IMG_RECORDS_DIR")]
    pub records_dir: Option<PathBuf>,

    /// JSON table of reference tags (`tags_info.json`).
    #[config(env = "SDSTASH_TAGS_INFO")]
    pub tags_info: Option<PathBuf>,

    /// JSON table of general tag descriptions (`general_tags.json`).
    #[config(env = "SDSTASH_GENERAL_TAGS")]
    pub general_tags: Option<PathBuf>,

    /// Seconds to wait for the tag extractor before failing the ingestion.
    #[config(env = "SDSTASH_EXTRACT_TIMEOUT_SECS")]
    pub extract_timeout_secs: Option<u64>,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            records_dir: None,
            tags_info: None,
            general_tags: None,
            extract_timeout_secs: None,
        }
    }
}

impl StashConfig {
    /// Load from the environment, then `file` if given and present, then defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = file {
            builder = builder.file(path);
        }
        builder
            .load()
            .map_err(|e| StashError::Config(e.to_string()))
    }

    pub fn records_dir(&self) -> &Path {
        self.records_dir.as_deref().unwrap_or(&self.storage_dir)
    }

    pub fn extract_timeout(&self) -> Option<Duration> {
        self.extract_timeout_secs.map(Duration::from_secs)
    }
}
