//! Fakes for exercising the record store without a tagging model or a disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{Result, StashError};
use crate::model::GeneratedImage;
use crate::recorder::{Collaborators, ImageRecorder};
use crate::sdmeta::WebuiParametersParser;
use crate::store::{MemBackend, MemBlobStore};
use crate::tagger::{TagExtractor, TagGroups};
use crate::tags::{GeneralTagInfo, ReferenceTag, TagDatabase, TagReference};

/// A solid-colour image of the given size. The width doubles as the
/// [`WidthTagger`] key.
pub fn image(width: u32, height: u32) -> GeneratedImage {
    let shade = (width % 256) as u8;
    GeneratedImage::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb([shade, 128, 255 - shade]),
    )))
}

/// Tag groups with a `general` rating and every tag scored 0.9.
pub fn groups(general: &[&str], character: &[&str]) -> TagGroups {
    let scored = |tags: &[&str]| tags.iter().map(|t| (t.to_string(), 0.9)).collect();
    TagGroups {
        rating: vec![("general".to_string(), 0.9), ("sensitive".to_string(), 0.1)],
        general: scored(general),
        character: scored(character),
        embedding: vec![0.0; 4],
    }
}

/// Tags images by looking up their width. Unknown widths fail extraction.
#[derive(Debug, Default)]
pub struct WidthTagger {
    by_width: HashMap<u32, TagGroups>,
    calls: AtomicUsize,
}

impl WidthTagger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, width: u32, groups: TagGroups) -> Self {
        self.by_width.insert(width, groups);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TagExtractor for WidthTagger {
    fn extract(&self, image: &GeneratedImage) -> Result<TagGroups> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_width.get(&image.width()).cloned().ok_or_else(|| {
            StashError::Extraction(format!("no tags scripted for width {}", image.width()))
        })
    }
}

/// Reference tags used across the tests: `cat` (alias `kitty`), `dog`, `solo`,
/// `category` and the character `hatsune_miku` (alias `miku`).
pub fn sample_database() -> TagDatabase {
    let tag = |name: &str, category: i64, aliases: &[&str]| ReferenceTag {
        name: name.to_string(),
        category,
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
    };
    let tags = vec![
        tag("cat", 0, &["kitty"]),
        tag("dog", 0, &["puppy"]),
        tag("solo", 0, &[]),
        tag("category", 0, &[]),
        tag("hatsune_miku", 4, &["miku"]),
    ];
    let general = vec![GeneralTagInfo {
        name: "cat".to_string(),
        aliases: vec!["kitty".to_string()],
        en_desc: Some("A small domesticated feline.".to_string()),
        ..Default::default()
    }];
    TagDatabase::new(tags, general)
}

/// A recorder over in-memory storage, with handles on every fake.
pub struct TestRig {
    pub backend: Arc<MemBackend>,
    pub blobs: Arc<MemBlobStore>,
    pub tagger: Arc<WidthTagger>,
    pub reference: Arc<dyn TagReference>,
    pub recorder: ImageRecorder<Arc<MemBackend>>,
}

impl TestRig {
    pub fn new(tagger: WidthTagger) -> Self {
        Self::with_reference(tagger, Arc::new(sample_database()))
    }

    pub fn with_reference(tagger: WidthTagger, reference: Arc<dyn TagReference>) -> Self {
        let backend = Arc::new(MemBackend::new());
        let blobs = Arc::new(MemBlobStore::new());
        let tagger = Arc::new(tagger);
        let recorder = Self::build(&backend, &blobs, &tagger, &reference);
        Self {
            backend,
            blobs,
            tagger,
            reference,
            recorder,
        }
    }

    /// A second recorder over the same backend and blobs, as after a restart.
    pub fn reopen(&self) -> ImageRecorder<Arc<MemBackend>> {
        Self::build(&self.backend, &self.blobs, &self.tagger, &self.reference)
    }

    fn build(
        backend: &Arc<MemBackend>,
        blobs: &Arc<MemBlobStore>,
        tagger: &Arc<WidthTagger>,
        reference: &Arc<dyn TagReference>,
    ) -> ImageRecorder<Arc<MemBackend>> {
        let deps = Collaborators {
            blobs: blobs.clone(),
            tagger: tagger.clone(),
            parser: Arc::new(WebuiParametersParser),
            reference: reference.clone(),
        };
        ImageRecorder::open(Arc::clone(backend), deps).expect("in-memory backend loads")
    }
}
