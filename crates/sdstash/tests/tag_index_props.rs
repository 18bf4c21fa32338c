//! Property tests for the tag-count index and tag queries.

use image::{DynamicImage, RgbImage};
use proptest::prelude::*;
use sdstash::store::{MemBackend, MemBlobStore};
use sdstash::tags::{ReferenceTag, TagDatabase};
use sdstash::{
    Collaborators, GeneratedImage, ImageRecorder, Result, TagExtractor, TagGroups,
    WebuiParametersParser,
};
use std::collections::HashSet;
use std::sync::Arc;

const TAGS: usize = 5;

fn tag_name(bit: usize) -> String {
    format!("t{}", bit)
}

/// Bit `i` of the image width switches tag `t{i}` on. Even bits are general
/// tags, odd bits character tags.
fn bit_tagger() -> Arc<dyn TagExtractor> {
    Arc::new(|img: &GeneratedImage| -> Result<TagGroups> {
        let mut groups = TagGroups {
            rating: vec![("general".to_string(), 1.0)],
            ..Default::default()
        };
        for bit in (0..TAGS).filter(|b| img.width() & (1 << b) != 0) {
            let entry = (tag_name(bit), 0.5);
            if bit % 2 == 0 {
                groups.general.push(entry);
            } else {
                groups.character.push(entry);
            }
        }
        Ok(groups)
    })
}

fn reference() -> TagDatabase {
    let tags = (0..TAGS)
        .map(|bit| ReferenceTag {
            name: tag_name(bit),
            category: if bit % 2 == 0 { 0 } else { 4 },
            aliases: vec![format!("alias_{}", bit)],
        })
        .collect();
    TagDatabase::new(tags, Vec::new())
}

fn recorder(backend: Arc<MemBackend>, blobs: Arc<MemBlobStore>) -> ImageRecorder<Arc<MemBackend>> {
    let deps = Collaborators {
        blobs,
        tagger: bit_tagger(),
        parser: Arc::new(WebuiParametersParser),
        reference: Arc::new(reference()),
    };
    ImageRecorder::open(backend, deps).unwrap()
}

fn image(width: u32) -> GeneratedImage {
    GeneratedImage::new(DynamicImage::ImageRgb8(RgbImage::new(width, 1)))
}

fn has_bit(width: u32, bit: usize) -> bool {
    width & (1 << bit) != 0
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn tag_counts_match_records(widths in prop::collection::vec(1u32..32, 0..12)) {
        let rec = recorder(Arc::new(MemBackend::new()), Arc::new(MemBlobStore::new()));
        for &w in &widths {
            rec.put_image(&image(w), None).unwrap();
        }

        let records = rec.records();
        prop_assert_eq!(records.len(), widths.len());
        for stat in rec.list_tags() {
            let expected = records.iter().filter(|r| r.has_tag(&stat.tag)).count() as u64;
            prop_assert_eq!(stat.count, expected);
            prop_assert!(stat.count > 0);
        }
        for bit in 0..TAGS {
            let expected = widths.iter().filter(|&&w| has_bit(w, bit)).count() as u64;
            let actual = rec
                .list_tags()
                .into_iter()
                .find(|t| t.tag == tag_name(bit))
                .map(|t| t.count)
                .unwrap_or(0);
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn query_matches_include_exclude_semantics(
        widths in prop::collection::vec(1u32..32, 1..10),
        include in prop::collection::btree_set(0usize..TAGS, 0..3),
        exclude in prop::collection::btree_set(0usize..TAGS, 0..3),
    ) {
        let rec = recorder(Arc::new(MemBackend::new()), Arc::new(MemBlobStore::new()));
        for &w in &widths {
            rec.put_image(&image(w), None).unwrap();
        }

        // query through aliases to exercise resolution as well
        let inc: Vec<String> = include.iter().map(|b| format!("alias_{}", b)).collect();
        let exc: Vec<String> = exclude.iter().map(|b| format!("alias_{}", b)).collect();
        let hits: Vec<u32> = rec
            .query_records_with_tags(&inc, &exc)
            .unwrap()
            .iter()
            .map(|r| r.width)
            .collect();

        let expected: Vec<u32> = widths
            .iter()
            .copied()
            .filter(|&w| include.iter().all(|&b| has_bit(w, b)))
            .filter(|&w| !exclude.iter().any(|&b| has_bit(w, b)))
            .collect();
        prop_assert_eq!(hits, expected);
    }

    #[test]
    fn save_and_reload_preserves_state(widths in prop::collection::vec(1u32..32, 0..8)) {
        let backend = Arc::new(MemBackend::new());
        let blobs = Arc::new(MemBlobStore::new());
        let rec = recorder(Arc::clone(&backend), Arc::clone(&blobs));
        for &w in &widths {
            rec.put_image(&image(w), None).unwrap();
        }
        prop_assert_eq!(rec.save().unwrap(), !widths.is_empty());

        let reopened = recorder(backend, blobs);
        prop_assert_eq!(reopened.records(), rec.records());
        prop_assert_eq!(reopened.list_tags(), rec.list_tags());

        let names: HashSet<String> = reopened.records().into_iter().map(|r| r.filename).collect();
        prop_assert_eq!(names.len(), widths.len());
    }
}
