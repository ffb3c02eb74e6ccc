//! Tests for merge
//!
//! These tests verify:
//! - Last-write-wins across the whole input set
//! - Independence from caller-supplied input order
//! - Inputs are left untouched
//! - The merged segment holds one record per key

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use segkv::storage::MERGED_SEGMENT_NAME;
use segkv::{merge, Record, SegKvError, Segment, Store, Config};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn segment_with(dir: &Path, name: &str, sequence: u64, entries: &[(&str, &str)]) -> Segment {
    let mut segment = Segment::open(&dir.join(name), sequence).unwrap();
    for (k, v) in entries {
        segment.put(&Record::new(*k, *v)).unwrap();
    }
    segment
}

// =============================================================================
// Merge Semantics Tests
// =============================================================================

#[test]
fn test_newest_value_wins() {
    let temp = TempDir::new().unwrap();
    let s1 = segment_with(temp.path(), "segment-0", 0, &[("k1", "a"), ("k2", "b")]);
    let s2 = segment_with(temp.path(), "segment-1", 1, &[("k1", "c")]);

    let merged = merge(temp.path(), &[&s1, &s2]).unwrap();

    assert_eq!(merged.get(b"k1").unwrap(), b"c");
    assert_eq!(merged.get(b"k2").unwrap(), b"b");
    assert_eq!(merged.len(), 2);
}

#[test]
fn test_input_order_does_not_matter() {
    let temp = TempDir::new().unwrap();
    let s1 = segment_with(temp.path(), "segment-0", 0, &[("k1", "a"), ("k2", "b")]);
    let s2 = segment_with(temp.path(), "segment-1", 1, &[("k1", "c")]);

    // Newest first on purpose
    let merged = merge(temp.path(), &[&s2, &s1]).unwrap();

    assert_eq!(merged.get(b"k1").unwrap(), b"c");
    assert_eq!(merged.get(b"k2").unwrap(), b"b");
}

#[test]
fn test_equal_sequences_keep_caller_order() {
    let temp = TempDir::new().unwrap();
    let a = segment_with(temp.path(), "a", 0, &[("k", "from-a")]);
    let b = segment_with(temp.path(), "b", 0, &[("k", "from-b")]);

    let merged = merge(temp.path(), &[&a, &b]).unwrap();

    assert_eq!(merged.get(b"k").unwrap(), b"from-b");
}

#[test]
fn test_merged_segment_layout() {
    let temp = TempDir::new().unwrap();
    let s1 = segment_with(temp.path(), "segment-0", 3, &[("x", "1"), ("x", "2"), ("y", "1")]);
    let s2 = segment_with(temp.path(), "segment-1", 8, &[("x", "3"), ("z", "1")]);

    let merged = merge(temp.path(), &[&s1, &s2]).unwrap();

    assert_eq!(merged.path(), temp.path().join(MERGED_SEGMENT_NAME));
    assert_eq!(merged.sequence(), 8);
    // History is gone: exactly one record per key
    assert_eq!(merged.record_count(), 3);
    assert_eq!(merged.len(), 3);

    let expected: u64 = [("x", "3"), ("y", "1"), ("z", "1")]
        .iter()
        .map(|(k, v)| Record::new(*k, *v).encoded_len())
        .sum();
    assert_eq!(merged.size().unwrap(), expected);
}

#[test]
fn test_merged_segment_is_read_only() {
    let temp = TempDir::new().unwrap();
    let s1 = segment_with(temp.path(), "segment-0", 0, &[("k", "v")]);

    let mut merged = merge(temp.path(), &[&s1]).unwrap();

    assert!(merged.is_sealed());
    assert!(matches!(
        merged.put(&Record::new("k", "w")),
        Err(SegKvError::SegmentSealed(_))
    ));
    assert_eq!(merged.get(b"k").unwrap(), b"v");
}

#[test]
fn test_inputs_untouched() {
    let temp = TempDir::new().unwrap();
    let s1 = segment_with(temp.path(), "segment-0", 0, &[("k1", "a"), ("k1", "b")]);
    let s2 = segment_with(temp.path(), "segment-1", 1, &[("k2", "c")]);
    let sizes = (s1.size().unwrap(), s2.size().unwrap());

    let _merged = merge(temp.path(), &[&s1, &s2]).unwrap();

    assert_eq!((s1.size().unwrap(), s2.size().unwrap()), sizes);
    assert_eq!(s1.record_count(), 2);
    assert_eq!(s1.get(b"k1").unwrap(), b"b");
    assert_eq!(s2.get(b"k2").unwrap(), b"c");
    assert!(!s1.is_sealed());
}

#[test]
fn test_merge_empty_input() {
    let temp = TempDir::new().unwrap();

    let merged = merge(temp.path(), &[]).unwrap();

    assert!(merged.is_empty());
    assert_eq!(merged.sequence(), 0);
    assert_eq!(merged.size().unwrap(), 0);
}

#[test]
fn test_merge_never_loses_keys() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(data.path())
        .segment_capacity(48)
        .build();
    let store = Store::open(config).unwrap();
    let mut expected: HashMap<String, String> = HashMap::new();

    for i in 0..150 {
        let key = format!("key-{}", (i * 7) % 23);
        let value = format!("v{}", i);
        store.put(key.as_bytes(), value.as_bytes()).unwrap();
        expected.insert(key, value);
    }
    assert!(store.segment_count() > 2);

    let merged = store.merge_into(out.path()).unwrap();

    assert_eq!(merged.len(), expected.len());
    for (key, value) in &expected {
        assert_eq!(merged.get(key.as_bytes()).unwrap(), value.as_bytes());
    }
}

#[test]
fn test_concurrent_merges_keep_every_key() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(data.path())
        .segment_capacity(4096)
        .build();
    let store = Arc::new(Store::open(config).unwrap());

    for i in 0..2000 {
        store.put(format!("key-{}", i).as_bytes(), b"some value").unwrap();
    }
    let live_keys = store.stats().unwrap().live_keys;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        let out = out.path().to_path_buf();
        handles.push(thread::spawn(move || {
            let mut lens = Vec::new();
            for _ in 0..5 {
                lens.push(store.merge_into(&out).unwrap().len());
            }
            lens
        }));
    }

    for handle in handles {
        for len in handle.join().unwrap() {
            assert_eq!(len, live_keys);
        }
    }

    // Only the finished merge is left behind
    let names: Vec<String> = fs::read_dir(out.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![MERGED_SEGMENT_NAME.to_string()]);
}

// =============================================================================
// Output File Tests
// =============================================================================

#[test]
fn test_stale_output_is_replaced() {
    let temp = TempDir::new().unwrap();
    // Would fail to decode if it were kept
    fs::write(temp.path().join(MERGED_SEGMENT_NAME), [7u8, 0, 0]).unwrap();
    let s1 = segment_with(temp.path(), "segment-0", 0, &[("k", "v")]);

    let merged = merge(temp.path(), &[&s1]).unwrap();

    assert_eq!(merged.get(b"k").unwrap(), b"v");
    assert_eq!(merged.record_count(), 1);
}

#[test]
fn test_output_overwriting_input_is_refused() {
    let temp = TempDir::new().unwrap();
    let input = segment_with(temp.path(), MERGED_SEGMENT_NAME, 0, &[("k", "v")]);

    let result = merge(temp.path(), &[&input]);

    assert!(matches!(result, Err(SegKvError::Storage(_))));
    assert_eq!(input.get(b"k").unwrap(), b"v");
}

#[test]
fn test_merged_segment_reopens() {
    let temp = TempDir::new().unwrap();
    let s1 = segment_with(temp.path(), "segment-0", 0, &[("a", "1"), ("b", "2")]);
    let s2 = segment_with(temp.path(), "segment-1", 1, &[("a", "3")]);

    let path = merge(temp.path(), &[&s1, &s2]).unwrap().path().to_path_buf();
    let reopened = Segment::open(&path, 1).unwrap();

    assert_eq!(reopened.get(b"a").unwrap(), b"3");
    assert_eq!(reopened.get(b"b").unwrap(), b"2");
}
