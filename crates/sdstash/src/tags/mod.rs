//! Tag support for sdstash.
//!
//! Tags come from the extractor in two categories, `general` and `character`, and
//! keep that category for their whole life in the store. The store keeps one
//! [`TagStat`] per distinct tag with the number of records carrying it.
//!
//! ## Reference Database
//!
//! Queries never match raw user input. Each query tag is resolved through a
//! [`TagReference`] first, which maps aliases to canonical names. See [`reference`].
//!
//! ## Ordering
//!
//! The materialized tag index is ordered by `count` descending, then `tag`
//! ascending, then `type` ascending. See [`sort_tag_stats`].

pub mod info;
pub mod query;
pub mod reference;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub use info::{TagInfo, Translation};
pub use query::TagQuery;
pub use reference::{
    GeneralTagInfo, LazyTagDatabase, ReferenceTag, TagDatabase, TagDescription, TagReference,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    General,
    Character,
}

impl TagType {
    /// Maps a reference database category code. Only 0 and 4 are tag types we keep.
    pub fn from_category(category: i64) -> Option<Self> {
        match category {
            0 => Some(TagType::General),
            4 => Some(TagType::Character),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::General => "general",
            TagType::Character => "character",
        }
    }
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the tag-count index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStat {
    pub tag: String,
    #[serde(rename = "type")]
    pub tag_type: TagType,
    pub count: u64,
}

impl TagStat {
    pub fn new(tag: String, tag_type: TagType) -> Self {
        Self {
            tag,
            tag_type,
            count: 0,
        }
    }
}

fn compare_tag_stats(a: &TagStat, b: &TagStat) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| a.tag.cmp(&b.tag))
        .then_with(|| a.tag_type.as_str().cmp(b.tag_type.as_str()))
}

/// Sorts by count descending, tag ascending, type ascending.
pub fn sort_tag_stats(stats: &mut [TagStat]) {
    stats.sort_by(compare_tag_stats);
}
