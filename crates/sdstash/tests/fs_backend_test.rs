use chrono::{TimeZone, Utc};
use sdstash::model::{ImageRecord, TagTokens};
use sdstash::store::backend::RecordBackend;
use sdstash::store::fs_backend::FsBackend;
use sdstash::store::table::Table;
use sdstash::tags::{TagStat, TagType};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, FsBackend) {
    let dir = TempDir::new().unwrap();
    let backend = FsBackend::new(dir.path().to_path_buf());
    (dir, backend)
}

fn record(filename: &str, tags: &[&str], extra: &[(&str, serde_json::Value)]) -> ImageRecord {
    ImageRecord {
        filename: filename.to_string(),
        rating: "general".to_string(),
        tags: TagTokens::from_tags(tags),
        width: 512,
        height: 768,
        prompt: Some("a cat".to_string()),
        neg_prompt: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        extra: extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn test_missing_files_load_empty() {
    let (_dir, backend) = setup();
    assert!(backend.load_records().unwrap().is_empty());
    assert!(backend.load_tags().unwrap().is_empty());
}

#[test]
fn test_records_round_trip_with_sparse_columns() {
    let (_dir, backend) = setup();
    let records = vec![
        record("a.png", &["cat"], &[("Steps", json!(20))]),
        record("b.png", &["dog", "solo"], &[("Seed", json!(7))]),
    ];

    backend.save_records(&records).unwrap();
    let loaded = backend.load_records().unwrap();

    assert_eq!(loaded, records);
    assert!(!loaded[0].extra.contains_key("Seed"));
    assert!(!loaded[1].extra.contains_key("Steps"));
}

#[test]
fn test_tags_round_trip() {
    let (_dir, backend) = setup();
    let mut cat = TagStat::new("cat".to_string(), TagType::General);
    cat.count = 3;
    let mut miku = TagStat::new("hatsune_miku".to_string(), TagType::Character);
    miku.count = 1;
    let tags = vec![cat, miku];

    backend.save_tags(&tags).unwrap();
    assert_eq!(backend.load_tags().unwrap(), tags);
}

#[test]
fn test_on_disk_layout_is_column_table() {
    let (dir, backend) = setup();
    backend
        .save_records(&[
            record("a.png", &["cat"], &[("Steps", json!(20))]),
            record("b.png", &["dog"], &[]),
        ])
        .unwrap();

    let content = fs::read_to_string(dir.path().join("records.json")).unwrap();
    let table: Table = serde_json::from_str(&content).unwrap();
    assert_eq!(table.len(), 2);
    assert!(table.columns.contains(&"filename".to_string()));
    assert!(table.columns.contains(&"Steps".to_string()));

    let steps = table.columns.iter().position(|c| c == "Steps").unwrap();
    assert_eq!(table.rows[1][steps], serde_json::Value::Null);

    let tags_col = table.columns.iter().position(|c| c == "tags").unwrap();
    assert_eq!(table.rows[0][tags_col], json!(" cat "));
}

#[test]
fn test_tag_type_serialized_lowercase() {
    let (dir, backend) = setup();
    let mut stat = TagStat::new("hatsune_miku".to_string(), TagType::Character);
    stat.count = 2;
    backend.save_tags(&[stat]).unwrap();

    let content = fs::read_to_string(dir.path().join("tags.json")).unwrap();
    let table: Table = serde_json::from_str(&content).unwrap();
    let type_col = table.columns.iter().position(|c| c == "type").unwrap();
    assert_eq!(table.rows[0][type_col], json!("character"));
}

#[test]
fn test_save_overwrites_and_leaves_no_tmp_files() {
    let (dir, backend) = setup();
    backend.save_records(&[record("a.png", &["cat"], &[])]).unwrap();
    backend
        .save_records(&[record("b.png", &["dog"], &[])])
        .unwrap();

    let loaded = backend.load_records().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].filename, "b.png");

    for entry in fs::read_dir(dir.path()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
    }
}

#[test]
fn test_corrupt_records_file_is_an_error() {
    let (dir, backend) = setup();
    fs::write(dir.path().join("records.json"), "{ not json").unwrap();
    assert!(backend.load_records().is_err());
}
