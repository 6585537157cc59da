use std::fs::File;
use std::io::Write;

use tempfile::tempdir;

use super::{HashIndex, NewRecord};
use crate::config::ScopeMode;

fn record(path: &str, fingerprint: &str) -> NewRecord {
    NewRecord {
        path: path.to_string(),
        fingerprint: fingerprint.to_string(),
        file_size: 1024,
        modified_time: 1_700_000_000,
        width: 640,
        height: 480,
    }
}

#[test]
fn open_creates_database_file() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("nested").join("index.db");

    let _index = HashIndex::open(&db_path).unwrap();
    assert!(db_path.exists());
}

#[test]
fn upsert_is_idempotent_by_path() {
    let mut index = HashIndex::open_in_memory().unwrap();

    index.upsert(&record("/test/image1.jpg", "abcd1234")).unwrap();
    index.upsert(&record("/test/image1.jpg", "ffff0000")).unwrap();

    assert_eq!(index.count().unwrap(), 1);
    let stored = index.get("/test/image1.jpg").unwrap().unwrap();
    // Latest fingerprint wins; the record is replaced wholesale
    assert_eq!(stored.fingerprint, "ffff0000");
}

#[test]
fn created_at_is_monotonically_increasing() {
    let mut index = HashIndex::open_in_memory().unwrap();

    index.upsert(&record("/a.jpg", "00")).unwrap();
    index.upsert(&record("/b.jpg", "01")).unwrap();
    index.upsert(&record("/c.jpg", "02")).unwrap();

    let a = index.get("/a.jpg").unwrap().unwrap().created_at;
    let b = index.get("/b.jpg").unwrap().unwrap().created_at;
    let c = index.get("/c.jpg").unwrap().unwrap().created_at;
    assert!(a < b && b < c);
}

#[test]
fn scan_returns_records_in_insertion_order() {
    let mut index = HashIndex::open_in_memory().unwrap();

    index.upsert(&record("/test/z.jpg", "00")).unwrap();
    index.upsert(&record("/test/a.jpg", "01")).unwrap();
    index.upsert(&record("/test/m.jpg", "02")).unwrap();

    let records = index.scan("/test").unwrap();
    let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/test/z.jpg", "/test/a.jpg", "/test/m.jpg"]);
}

#[test]
fn scan_uses_plain_string_prefix_semantics() {
    let mut index = HashIndex::open_in_memory().unwrap();

    index.upsert(&record("/a/b/img.jpg", "00")).unwrap();
    index.upsert(&record("/a/bc/img.jpg", "01")).unwrap();
    index.upsert(&record("/other/img.jpg", "02")).unwrap();

    // Legacy contract: `/a/b` is a string prefix of `/a/bc/...`, so the
    // sibling directory is included. Trailing separators matter.
    let records = index.scan("/a/b").unwrap();
    assert_eq!(records.len(), 2);

    let records = index.scan("/a/b/").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "/a/b/img.jpg");
}

#[test]
fn segment_scoping_excludes_string_prefix_siblings() {
    let mut index = HashIndex::open_in_memory().unwrap();

    index.upsert(&record("/a/b/img.jpg", "00")).unwrap();
    index.upsert(&record("/a/bc/img.jpg", "01")).unwrap();

    let records = index.scan_scoped("/a/b", ScopeMode::Prefix).unwrap();
    assert_eq!(records.len(), 2);

    let records = index.scan_scoped("/a/b", ScopeMode::Segment).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "/a/b/img.jpg");
}

#[test]
fn scan_with_empty_prefix_returns_everything() {
    let mut index = HashIndex::open_in_memory().unwrap();
    index.upsert(&record("/x/a.jpg", "00")).unwrap();
    index.upsert(&record("/y/b.jpg", "01")).unwrap();

    assert_eq!(index.scan("").unwrap().len(), 2);
}

#[test]
fn remove_missing_returns_zero_when_all_exist() {
    let dir = tempdir().unwrap();
    let mut index = HashIndex::open_in_memory().unwrap();

    for name in ["a.jpg", "b.jpg"] {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(b"x").unwrap();
        index
            .upsert(&record(path.to_str().unwrap(), "00"))
            .unwrap();
    }

    let removed = index
        .remove_missing(|p| std::path::Path::new(p).exists())
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(index.count().unwrap(), 2);
}

#[test]
fn remove_missing_deletes_exactly_the_stale_records() {
    let dir = tempdir().unwrap();
    let mut index = HashIndex::open_in_memory().unwrap();

    let mut paths = Vec::new();
    for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(b"x").unwrap();
        index
            .upsert(&record(path.to_str().unwrap(), "00"))
            .unwrap();
        paths.push(path);
    }

    // Delete 2 of the 4 backing files
    std::fs::remove_file(&paths[1]).unwrap();
    std::fs::remove_file(&paths[3]).unwrap();

    let removed = index
        .remove_missing(|p| std::path::Path::new(p).exists())
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(index.count().unwrap(), 2);
    assert!(index.get(paths[0].to_str().unwrap()).unwrap().is_some());
    assert!(index.get(paths[1].to_str().unwrap()).unwrap().is_none());
}

#[test]
fn clear_empties_the_index() {
    let mut index = HashIndex::open_in_memory().unwrap();
    index.upsert(&record("/a.jpg", "00")).unwrap();
    index.upsert(&record("/b.jpg", "01")).unwrap();

    index.clear().unwrap();
    assert_eq!(index.count().unwrap(), 0);
}

#[test]
fn clear_keeps_settings() {
    let mut index = HashIndex::open_in_memory().unwrap();
    index.set_last_directory("/photos").unwrap();
    index.upsert(&record("/a.jpg", "00")).unwrap();

    index.clear().unwrap();
    assert_eq!(index.last_directory().unwrap().as_deref(), Some("/photos"));
}

#[test]
fn last_directory_round_trips_and_overwrites() {
    let mut index = HashIndex::open_in_memory().unwrap();
    assert_eq!(index.last_directory().unwrap(), None);

    index.set_last_directory("/first").unwrap();
    index.set_last_directory("/second").unwrap();
    assert_eq!(index.last_directory().unwrap().as_deref(), Some("/second"));
}

#[test]
fn upsert_batch_writes_all_records() {
    let mut index = HashIndex::open_in_memory().unwrap();

    let records: Vec<NewRecord> = (0..10)
        .map(|i| record(&format!("/batch/{i}.jpg"), "00"))
        .collect();
    index.upsert_batch(&records).unwrap();

    assert_eq!(index.count().unwrap(), 10);
}
