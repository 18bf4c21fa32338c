//! # Image Recorder
//!
//! The record store proper. It owns two in-memory collections, the record list
//! and the tag-count index, plus a dirty flag. All three sit behind one mutex.
//!
//! ## Ingestion
//!
//! [`ImageRecorder::put_image`] runs the whole pipeline under the lock: tag
//! extraction, rating selection, metadata parsing, the blob write, then the record
//! append and the tag count updates. Concurrent callers are fully serialized. The
//! in-memory state is only touched after every fallible step has succeeded, so a
//! failed ingestion leaves nothing behind except, at most, an unreferenced blob.
//!
//! ## Tag-Count Invariant
//!
//! For every tag `t`, `count(t)` equals the number of records whose token list
//! contains `t`. Tags are deduplicated per image before counting, and nothing is
//! ever removed, so counts only grow.
//!
//! ## Persistence
//!
//! Nothing reaches the backend until [`ImageRecorder::save`]. A save materializes
//! both collections in their query order (newest record first; tags by count desc,
//! name asc, type asc) and hands them to the backend. A save with no changes since
//! the last one is a no-op. A failed save keeps the dirty flag so the next call
//! retries.
//!
//! ## Queries
//!
//! Query tags are resolved through the reference database before the lock is
//! taken. Tags it does not know are logged and skipped. Matching runs against a
//! locked snapshot, and blobs are loaded after the lock is released.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::StashConfig;
use crate::error::{Result, StashError};
use crate::model::{
    scalar_value, token_name, GeneratedImage, ImageRecord, TagTokens, RESERVED_COLUMNS,
};
use crate::sdmeta::{MetadataParser, ParsedMeta, WebuiParametersParser};
use crate::store::{BlobStore, FsBackend, FsBlobStore, RecordBackend};
use crate::tagger::{ExtractionSlot, TagExtractor};
use crate::tags::{
    sort_tag_stats, LazyTagDatabase, TagInfo, TagQuery, TagReference, TagStat, TagType,
};

/// The external services a recorder talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub blobs: Arc<dyn BlobStore>,
    pub tagger: Arc<dyn TagExtractor>,
    pub parser: Arc<dyn MetadataParser>,
    pub reference: Arc<dyn TagReference>,
}

#[derive(Default)]
struct RecorderState {
    records: Vec<ImageRecord>,
    filenames: HashSet<String>,
    tags: Vec<TagStat>,
    tag_positions: HashMap<String, usize>,
    last_created_at: Option<DateTime<Utc>>,
    dirty: bool,
}

impl RecorderState {
    fn from_loaded(records: Vec<ImageRecord>, tags: Vec<TagStat>) -> Self {
        let mut state = RecorderState {
            filenames: records.iter().map(|r| r.filename.clone()).collect(),
            last_created_at: records.iter().map(|r| r.created_at).max(),
            records,
            tags,
            ..Default::default()
        };
        state.reindex_tags();
        state
    }

    fn reindex_tags(&mut self) {
        self.tag_positions = self
            .tags
            .iter()
            .enumerate()
            .map(|(i, stat)| (stat.tag.clone(), i))
            .collect();
    }

    /// Now, or 1µs past the newest record if the clock has not moved on.
    fn next_created_at(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_created_at {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        }
    }

    fn push_record(&mut self, record: ImageRecord) {
        self.filenames.insert(record.filename.clone());
        self.last_created_at = Some(record.created_at);
        self.records.push(record);
    }

    fn count_tag(&mut self, tag: String, tag_type: TagType) {
        let idx = match self.tag_positions.get(&tag) {
            Some(&idx) => idx,
            None => {
                let idx = self.tags.len();
                self.tag_positions.insert(tag.clone(), idx);
                self.tags.push(TagStat::new(tag, tag_type));
                idx
            }
        };
        self.tags[idx].count += 1;
    }

    fn tag_count(&self, tag: &str) -> u64 {
        self.tag_positions
            .get(tag)
            .map(|&idx| self.tags[idx].count)
            .unwrap_or(0)
    }

    fn materialize(&mut self) {
        self.records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sort_tag_stats(&mut self.tags);
        self.reindex_tags();
    }
}

pub struct ImageRecorder<B: RecordBackend> {
    backend: B,
    deps: Collaborators,
    extraction: ExtractionSlot,
    state: Mutex<RecorderState>,
}

impl ImageRecorder<FsBackend> {
    /// Builds a recorder over on-disk storage as described by `config`.
    pub fn from_config(config: &StashConfig, tagger: Arc<dyn TagExtractor>) -> Result<Self> {
        let blobs = FsBlobStore::new(config.storage_dir.clone())?;
        let records_dir = config.records_dir().to_path_buf();
        fs::create_dir_all(&records_dir)?;

        let deps = Collaborators {
            blobs: Arc::new(blobs),
            tagger,
            parser: Arc::new(WebuiParametersParser),
            reference: Arc::new(LazyTagDatabase::new(
                config.tags_info.clone(),
                config.general_tags.clone(),
            )),
        };

        let recorder = Self::open(FsBackend::new(records_dir), deps)?;
        Ok(recorder.with_extract_timeout(config.extract_timeout()))
    }
}

impl<B: RecordBackend> ImageRecorder<B> {
    /// Opens a recorder, reloading whatever the backend has persisted.
    pub fn open(backend: B, deps: Collaborators) -> Result<Self> {
        let records = backend.load_records()?;
        let tags = backend.load_tags()?;
        debug!("reloaded {} records and {} tags", records.len(), tags.len());

        Ok(Self {
            backend,
            extraction: ExtractionSlot::new(Arc::clone(&deps.tagger), None),
            deps,
            state: Mutex::new(RecorderState::from_loaded(records, tags)),
        })
    }

    pub fn with_extract_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extraction.set_timeout(timeout);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stores an image and records it. Returns the blob filename.
    ///
    /// `meta_text` falls back to the image's own embedded parameters.
    pub fn put_image(&self, image: &GeneratedImage, meta_text: Option<&str>) -> Result<String> {
        let mut state = self.state.lock();

        let groups = self.extraction.extract(image)?;
        let rating = groups
            .top_rating()
            .ok_or_else(|| StashError::Extraction("tagger returned no rating scores".to_string()))?
            .to_string();
        let tags = groups.typed_tags();

        let text = meta_text.or(image.parameters.as_deref());
        let meta = text
            .map(|t| self.deps.parser.parse(t))
            .unwrap_or_default();

        let filename = self.deps.blobs.put(image, text)?;
        if state.filenames.contains(&filename) {
            return Err(StashError::BlobStore(format!(
                "blob store returned a duplicate filename {}",
                filename
            )));
        }

        let ParsedMeta {
            prompt,
            neg_prompt,
            parameters,
        } = meta;
        let record = ImageRecord {
            filename: filename.clone(),
            rating,
            tags: TagTokens::from_tags(tags.iter().map(|(tag, _)| tag)),
            width: image.width(),
            height: image.height(),
            prompt,
            neg_prompt,
            created_at: state.next_created_at(),
            extra: extra_columns(parameters),
        };

        info!(
            "stored {} ({}x{}, rating {}, {} tags)",
            filename,
            record.width,
            record.height,
            record.rating,
            tags.len()
        );
        state.push_record(record);
        for (tag, tag_type) in tags {
            state.count_tag(tag, tag_type);
        }
        state.dirty = true;

        Ok(filename)
    }

    /// Writes both collections if anything changed since the last save.
    /// Returns whether a write happened.
    pub fn save(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.dirty {
            debug!("no changes since last save");
            return Ok(false);
        }

        state.materialize();
        self.backend
            .save_records(&state.records)
            .and_then(|_| self.backend.save_tags(&state.tags))
            .map_err(|e| match e {
                StashError::Persistence(_) => e,
                other => StashError::Persistence(other.to_string()),
            })?;
        state.dirty = false;

        info!(
            "saved {} records and {} tags",
            state.records.len(),
            state.tags.len()
        );
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    /// Snapshot of all records in their current order.
    pub fn records(&self) -> Vec<ImageRecord> {
        self.state.lock().records.clone()
    }

    /// Snapshot of the tag index in its current order.
    pub fn list_tags(&self) -> Vec<TagStat> {
        self.state.lock().tags.clone()
    }

    fn resolve_tags<S: AsRef<str>>(&self, tags: &[S], negative: bool) -> Result<Vec<String>> {
        let mut resolved = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.as_ref();
            match self.deps.reference.resolve(tag)? {
                Some(canonical) => resolved.push(token_name(&canonical)),
                None if negative => {
                    warn!("Negative tag {:?} unrecognizable, it will be ignored.", tag)
                }
                None => warn!("Tag {:?} unrecognizable, it will be ignored.", tag),
            }
        }
        Ok(resolved)
    }

    /// Records carrying every `include` tag and none of the `exclude` tags.
    pub fn query_records_with_tags<S: AsRef<str>>(
        &self,
        include: &[S],
        exclude: &[S],
    ) -> Result<Vec<ImageRecord>> {
        let include = self.resolve_tags(include, false)?;
        let exclude = self.resolve_tags(exclude, true)?;
        info!(
            "Querying with tags: {:?} and negative tags: {:?} ...",
            include, exclude
        );

        let state = self.state.lock();
        Ok(state
            .records
            .iter()
            .filter(|r| include.iter().all(|t| r.has_tag(t)))
            .filter(|r| !exclude.iter().any(|t| r.has_tag(t)))
            .cloned()
            .collect())
    }

    /// Like [`Self::query_records_with_tags`], loading each match from the blob store.
    pub fn query_with_tags<S: AsRef<str>>(
        &self,
        include: &[S],
        exclude: &[S],
    ) -> Result<Vec<GeneratedImage>> {
        self.query_records_with_tags(include, exclude)?
            .iter()
            .map(|record| self.deps.blobs.get(&record.filename))
            .collect()
    }

    /// Runs a query written as text, e.g. `"cat_ears -dog"`.
    pub fn query_text(&self, text: &str) -> Result<Vec<GeneratedImage>> {
        let query = TagQuery::parse(text);
        self.query_with_tags(&query.include, &query.exclude)
    }

    pub fn get_tag_info(&self, tag: &str) -> Result<TagInfo> {
        let description = self
            .deps
            .reference
            .describe(tag)?
            .ok_or_else(|| StashError::UnknownTag(tag.to_string()))?;
        let count = self.state.lock().tag_count(&token_name(&description.name));
        Ok(TagInfo::from_description(description, count))
    }
}

/// Parameter map to record columns: scalars only, no nulls, no reserved names.
fn extra_columns(parameters: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    parameters
        .into_iter()
        .filter(|(key, value)| {
            if RESERVED_COLUMNS.contains(&key.as_str()) {
                warn!("generation parameter {:?} clashes with a record column, dropped", key);
                return false;
            }
            !value.is_null()
        })
        .map(|(key, value)| (key, scalar_value(value)))
        .collect()
}
