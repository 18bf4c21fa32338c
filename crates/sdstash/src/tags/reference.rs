//! # Reference Tag Database
//!
//! A static table of known tag names used to resolve query input. Two JSON files
//! feed it:
//!
//! - `tags_info.json`: `[{ "name", "category", "aliases": [..] }]`. Only categories
//!   `0` (general) and `4` (character) are kept. Every alias resolves to the entry's
//!   canonical name, and a canonical name always resolves to itself.
//! - `general_tags.json` (optional): descriptive data for general tags, keyed by
//!   canonical name. It holds aliases, other names, translations and wiki text.
//!
//! ## Lazy Loading
//!
//! [`LazyTagDatabase`] defers reading the files until the first lookup and then
//! keeps the parsed table for the life of the value. Lookups go through
//! [`LazyTagDatabase::acquire`], which fails with
//! [`StashError::MissingReferenceDatabase`] when nothing is configured or the
//! files cannot be read. Only operations that resolve tags are affected.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::TagType;
use crate::error::{Result, StashError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTag {
    pub name: String,
    pub category: i64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Descriptive data for a general tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralTagInfo {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub other_names: Vec<String>,
    #[serde(default)]
    pub en_tag: Option<String>,
    #[serde(default)]
    pub en_desc: Option<String>,
    #[serde(default)]
    pub zh_tag: Option<String>,
    #[serde(default)]
    pub zh_desc: Option<String>,
    #[serde(default)]
    pub jp_tag: Option<String>,
    #[serde(default)]
    pub jp_desc: Option<String>,
    #[serde(default)]
    pub wiki_desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagDescription {
    pub name: String,
    pub category: TagType,
    /// Only present for general tags listed in `general_tags.json`.
    pub general: Option<GeneralTagInfo>,
}

/// Resolves and describes tag names.
pub trait TagReference: Send + Sync {
    /// Maps a tag name or alias to its canonical name.
    fn resolve(&self, name: &str) -> Result<Option<String>>;

    fn describe(&self, name: &str) -> Result<Option<TagDescription>>;
}

#[derive(Debug, Default)]
pub struct TagDatabase {
    entries: Vec<(String, TagType)>,
    by_name: HashMap<String, usize>,
    general: HashMap<String, GeneralTagInfo>,
}

impl TagDatabase {
    pub fn new(tags: Vec<ReferenceTag>, general: Vec<GeneralTagInfo>) -> Self {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();
        let mut canonical = Vec::new();

        for tag in tags {
            let Some(tag_type) = TagType::from_category(tag.category) else {
                continue;
            };
            let idx = entries.len();
            for alias in &tag.aliases {
                by_name.insert(alias.clone(), idx);
            }
            canonical.push((tag.name.clone(), idx));
            entries.push((tag.name, tag_type));
        }
        // canonical names win over another entry's alias
        for (name, idx) in canonical {
            by_name.insert(name, idx);
        }

        let general = general
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();

        Self {
            entries,
            by_name,
            general,
        }
    }

    pub fn load(tags_info: &Path, general_tags: Option<&Path>) -> Result<Self> {
        let content = fs::read_to_string(tags_info)?;
        let tags: Vec<ReferenceTag> = serde_json::from_str(&content)?;

        let general = match general_tags {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            None => Vec::new(),
        };

        Ok(Self::new(tags, general))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&(String, TagType)> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }
}

impl TagReference for TagDatabase {
    fn resolve(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lookup(name).map(|(canonical, _)| canonical.clone()))
    }

    fn describe(&self, name: &str) -> Result<Option<TagDescription>> {
        Ok(self.lookup(name).map(|(canonical, category)| TagDescription {
            name: canonical.clone(),
            category: *category,
            general: match category {
                TagType::General => self.general.get(canonical).cloned(),
                TagType::Character => None,
            },
        }))
    }
}

/// A [`TagDatabase`] read from disk on first use.
#[derive(Debug)]
pub struct LazyTagDatabase {
    tags_info: Option<PathBuf>,
    general_tags: Option<PathBuf>,
    cell: OnceCell<TagDatabase>,
}

impl LazyTagDatabase {
    pub fn new(tags_info: Option<PathBuf>, general_tags: Option<PathBuf>) -> Self {
        Self {
            tags_info,
            general_tags,
            cell: OnceCell::new(),
        }
    }

    /// Returns the loaded database, reading it if this is the first call.
    /// A failed load is not cached; the next call tries again.
    pub fn acquire(&self) -> Result<&TagDatabase> {
        self.cell.get_or_try_init(|| {
            let path = self.tags_info.as_ref().ok_or_else(|| {
                StashError::MissingReferenceDatabase("no tags_info path configured".to_string())
            })?;
            let db = TagDatabase::load(path, self.general_tags.as_deref()).map_err(|e| {
                StashError::MissingReferenceDatabase(format!("{}: {}", path.display(), e))
            })?;
            log::debug!("loaded {} reference tags from {}", db.len(), path.display());
            Ok(db)
        })
    }
}

impl TagReference for LazyTagDatabase {
    fn resolve(&self, name: &str) -> Result<Option<String>> {
        self.acquire()?.resolve(name)
    }

    fn describe(&self, name: &str) -> Result<Option<TagDescription>> {
        self.acquire()?.describe(name)
    }
}
