//! Tests for Engine and Archive
//!
//! These tests verify:
//! - Create/extract round trips, including empty and block-aligned inputs
//! - Append, update and delete semantics
//! - Per-item failures versus fatal errors
//! - Block reuse after delete
//! - List is read-only

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use blockpack::command::OperationType;
use blockpack::{Archive, Config, Engine, InputSource, Operation, Outcome, PackError};
use tempfile::TempDir;

const BLOCK: u32 = 512;

// =============================================================================
// Helper Functions
// =============================================================================

fn small_config() -> Config {
    Config::builder()
        .block_size(BLOCK)
        .max_entries(8)
        .max_blocks_per_entry(64)
        .max_free_blocks(256)
        .build()
}

fn setup() -> (TempDir, Engine, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("test.pack");
    (temp_dir, Engine::new(small_config()), archive)
}

/// Deterministic, non-repeating-per-block content
fn content(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(31).wrapping_add(seed as u32) as u8)
        .collect()
}

fn write_input(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

fn stream(name: &str, data: Vec<u8>) -> InputSource {
    InputSource::stream(name, Cursor::new(data))
}

fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
    let mut archive = Archive::open_read_only(archive).unwrap();
    let mut out = Vec::new();
    archive.extract_entry(name, &mut out).unwrap();
    out
}

fn assert_invariants(archive: &Path) {
    let archive = Archive::open_read_only(archive).unwrap();
    archive.header().check_invariants().unwrap();
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_and_extract_round_trip() {
    let (temp, engine, archive) = setup();
    let sizes = [1usize, 511, 512, 513, 2000, 4096];
    let mut inputs = Vec::new();
    let mut expected = Vec::new();
    for (i, size) in sizes.iter().enumerate() {
        let name = format!("file_{}.bin", i);
        let data = content(*size, i as u8);
        let path = write_input(temp.path(), &name, &data);
        inputs.push(InputSource::named_file(name.clone(), path));
        expected.push((name, data));
    }

    let report = engine.create(&archive, inputs).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.completed.len(), sizes.len());

    let out_dir = temp.path().join("out");
    let report = engine.extract(&archive, &out_dir, &[]).unwrap();
    assert!(report.is_clean());

    for (name, data) in expected {
        assert_eq!(fs::read(out_dir.join(&name)).unwrap(), data, "{}", name);
    }
    assert_invariants(&archive);
}

#[test]
fn test_create_records_block_counts() {
    let (_temp, engine, archive) = setup();

    engine
        .create(
            &archive,
            vec![stream("exact", content(1024, 1)), stream("over", content(1025, 2))],
        )
        .unwrap();

    let entries = engine.list(&archive).unwrap();
    assert_eq!(entries[0].name, "exact");
    assert_eq!(entries[0].block_offsets.len(), 2);
    assert_eq!(entries[1].name, "over");
    assert_eq!(entries[1].block_offsets.len(), 3);
    assert_eq!(entries[1].total_size, 1025);
}

#[test]
fn test_create_uses_preallocated_block_first() {
    let (_temp, engine, archive) = setup();

    engine.create(&archive, vec![stream("a", content(10, 0))]).unwrap();

    let opened = Archive::open_read_only(&archive).unwrap();
    let header_size = opened.geometry().header_size;
    assert_eq!(opened.header().table().find_entry("a").unwrap().block_offsets, vec![header_size]);
    assert_eq!(opened.file_len(), header_size + BLOCK as u64);
    assert!(opened.header().registry().is_empty());
}

#[test]
fn test_create_empty_input_makes_empty_entry() {
    let (temp, engine, archive) = setup();

    engine.create(&archive, vec![stream("empty", Vec::new())]).unwrap();

    let entries = engine.list(&archive).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].total_size, 0);
    assert!(entries[0].block_offsets.is_empty());

    let out_dir = temp.path().join("out");
    engine.extract(&archive, &out_dir, &[]).unwrap();
    assert_eq!(fs::read(out_dir.join("empty")).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_create_without_inputs() {
    let (_temp, engine, archive) = setup();

    let report = engine.create(&archive, Vec::new()).unwrap();

    assert!(report.is_clean());
    assert!(engine.list(&archive).unwrap().is_empty());
    assert_invariants(&archive);
}

#[test]
fn test_create_truncates_existing_container() {
    let (_temp, engine, archive) = setup();
    engine.create(&archive, vec![stream("old", content(3000, 0))]).unwrap();

    engine.create(&archive, vec![stream("new", content(10, 0))]).unwrap();

    let entries = engine.list(&archive).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "new");
}

#[test]
fn test_missing_input_is_reported_not_fatal() {
    let (temp, engine, archive) = setup();
    let good = write_input(temp.path(), "good.txt", b"fine");

    let report = engine
        .create(
            &archive,
            vec![
                InputSource::named_file("missing.txt", temp.path().join("missing.txt")),
                InputSource::named_file("good.txt", good),
            ],
        )
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "missing.txt");
    assert!(matches!(report.failures[0].error, PackError::Input { .. }));
    assert_eq!(read_entry(&archive, "good.txt"), b"fine");
    assert!(engine.list(&archive).unwrap().iter().all(|e| e.name != "missing.txt"));
}

#[test]
fn test_invalid_name_is_reported() {
    let (_temp, engine, archive) = setup();

    let report = engine
        .create(&archive, vec![stream(&"n".repeat(300), content(5, 0))])
        .unwrap();

    assert!(matches!(report.failures[0].error, PackError::InvalidName { .. }));
    assert!(engine.list(&archive).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn test_non_utf8_file_name_is_reported() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (temp, engine, archive) = setup();
    let bad = temp.path().join(OsStr::from_bytes(b"bad\xff"));
    fs::write(&bad, b"hello").unwrap();
    let good = write_input(temp.path(), "good.txt", b"fine");

    let report = engine
        .create(&archive, vec![InputSource::file(&bad), InputSource::file(&good)])
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, PackError::InvalidName { .. }));
    assert_eq!(report.completed.len(), 1);
    let entries = engine.list(&archive).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, good.to_str().unwrap());
}

#[test]
fn test_same_name_twice_concatenates() {
    let (_temp, engine, archive) = setup();
    let first = content(700, 1);
    let second = content(900, 2);

    engine
        .create(&archive, vec![stream("log", first.clone()), stream("log", second.clone())])
        .unwrap();

    let mut expected = first;
    expected.extend_from_slice(&second);
    assert_eq!(read_entry(&archive, "log"), expected);
    assert_eq!(engine.list(&archive).unwrap()[0].total_size, 1600);
    assert_invariants(&archive);
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_adds_entries_without_disturbing_existing() {
    let (_temp, engine, archive) = setup();
    let a = content(1500, 1);
    engine.create(&archive, vec![stream("a", a.clone())]).unwrap();
    let before = engine.list(&archive).unwrap();

    engine.append(&archive, vec![stream("b", content(800, 2))]).unwrap();

    let after = engine.list(&archive).unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0], before[0]);
    assert_eq!(read_entry(&archive, "a"), a);
    assert_eq!(read_entry(&archive, "b"), content(800, 2));
    assert_invariants(&archive);
}

#[test]
fn test_append_to_existing_name_tops_up_tail() {
    let (_temp, engine, archive) = setup();
    let first = content(600, 3);
    let second = content(1000, 4);
    engine.create(&archive, vec![stream("data", first.clone())]).unwrap();

    engine.append(&archive, vec![stream("data", second.clone())]).unwrap();

    let entry = engine.list(&archive).unwrap().remove(0);
    assert_eq!(entry.total_size, 1600);
    // ceil(1600 / 512) = 4 blocks, not 2 + 2
    assert_eq!(entry.block_offsets.len(), 4);

    let mut expected = first;
    expected.extend_from_slice(&second);
    assert_eq!(read_entry(&archive, "data"), expected);
    assert_invariants(&archive);
}

#[test]
fn test_append_to_missing_container_is_fatal() {
    let (temp, engine, _archive) = setup();

    let result = engine.append(&temp.path().join("nope.pack"), vec![stream("a", vec![1])]);

    assert!(matches!(result, Err(PackError::Io(_))));
}

#[test]
fn test_append_to_non_container_is_format_error() {
    let (temp, engine, _archive) = setup();
    let bogus = write_input(temp.path(), "bogus.pack", &content(8192, 0));

    let result = engine.append(&bogus, vec![stream("a", vec![1])]);

    assert!(matches!(result, Err(PackError::Format(_))));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_removes_entry_and_frees_blocks() {
    let (_temp, engine, archive) = setup();
    engine
        .create(&archive, vec![stream("a", content(1200, 1)), stream("b", content(100, 2))])
        .unwrap();
    let a_blocks = engine.list(&archive).unwrap()[0].block_offsets.clone();

    let report = engine.delete(&archive, &["a".to_string()]).unwrap();
    assert!(report.is_clean());

    let entries = engine.list(&archive).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "b");

    let opened = Archive::open_read_only(&archive).unwrap();
    let free: Vec<u64> = opened.header().registry().iter().collect();
    assert_eq!(free, a_blocks);
    opened.header().check_invariants().unwrap();
}

#[test]
fn test_delete_missing_name_continues() {
    let (_temp, engine, archive) = setup();
    engine
        .create(&archive, vec![stream("a", vec![1]), stream("b", vec![2])])
        .unwrap();

    let report = engine
        .delete(&archive, &["ghost".to_string(), "b".to_string()])
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, PackError::NotFound(_)));
    assert_eq!(report.completed, vec![("b".to_string(), 1)]);
    let names: Vec<String> = engine.list(&archive).unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a".to_string()]);
}

#[test]
fn test_delete_then_append_reuses_released_block() {
    let (_temp, engine, archive) = setup();
    engine.create(&archive, vec![stream("first", content(900, 1))]).unwrap();
    let released = engine.list(&archive).unwrap()[0].block_offsets.clone();
    let len_before = Archive::open_read_only(&archive).unwrap().file_len();

    engine.delete(&archive, &["first".to_string()]).unwrap();
    engine.append(&archive, vec![stream("second", content(300, 2))]).unwrap();

    let second = engine.list(&archive).unwrap().remove(0);
    assert_eq!(second.block_offsets[0], released[0]);
    assert_eq!(Archive::open_read_only(&archive).unwrap().file_len(), len_before);
    assert_eq!(read_entry(&archive, "second"), content(300, 2));
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_replaces_content_in_place() {
    let (temp, engine, archive) = setup();
    let a = write_input(temp.path(), "a.txt", &content(1500, 1));
    let b = write_input(temp.path(), "b.txt", &content(50, 2));
    let c = write_input(temp.path(), "c.txt", &content(700, 3));
    engine
        .create(
            &archive,
            vec![
                InputSource::file(&a),
                InputSource::file(&b),
                InputSource::file(&c),
            ],
        )
        .unwrap();

    let new_b = content(2100, 9);
    fs::write(&b, &new_b).unwrap();
    let b_name = b.to_string_lossy().into_owned();

    let report = engine.update(&archive, &[b_name.clone()]).unwrap();
    assert!(report.is_clean());

    let entries = engine.list(&archive).unwrap();
    assert_eq!(entries[1].name, b_name);
    assert_eq!(entries[1].total_size, 2100);
    assert_eq!(read_entry(&archive, &b_name), new_b);
    assert_eq!(read_entry(&archive, &a.to_string_lossy()), content(1500, 1));
    assert_invariants(&archive);
}

#[test]
fn test_update_shrinking_frees_blocks() {
    let (_temp, engine, archive) = setup();
    engine.create(&archive, vec![stream("x", content(2048, 1))]).unwrap();

    engine
        .update_from(&archive, vec![stream("x", content(10, 2))])
        .unwrap();

    let opened = Archive::open_read_only(&archive).unwrap();
    let entry = opened.header().table().find_entry("x").unwrap();
    assert_eq!(entry.block_count(), 1);
    assert_eq!(opened.header().registry().len(), 3);
    opened.header().check_invariants().unwrap();
    assert_eq!(read_entry(&archive, "x"), content(10, 2));
}

#[test]
fn test_update_reuses_own_blocks() {
    let (_temp, engine, archive) = setup();
    engine.create(&archive, vec![stream("x", content(1024, 1))]).unwrap();
    let old_blocks = engine.list(&archive).unwrap()[0].block_offsets.clone();
    let len_before = Archive::open_read_only(&archive).unwrap().file_len();

    engine
        .update_from(&archive, vec![stream("x", content(1024, 7))])
        .unwrap();

    assert_eq!(engine.list(&archive).unwrap()[0].block_offsets, old_blocks);
    assert_eq!(Archive::open_read_only(&archive).unwrap().file_len(), len_before);
}

#[test]
fn test_update_missing_entry_reported() {
    let (_temp, engine, archive) = setup();
    engine.create(&archive, vec![stream("x", vec![1, 2, 3])]).unwrap();

    let report = engine
        .update_from(&archive, vec![stream("y", vec![4]), stream("x", vec![5, 6])])
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(&report.failures[0].error, PackError::NotFound(n) if n == "y"));
    assert_eq!(read_entry(&archive, "x"), vec![5, 6]);
}

#[test]
fn test_update_unreadable_source_leaves_entry() {
    let (temp, engine, archive) = setup();
    engine.create(&archive, vec![stream("x", content(700, 1))]).unwrap();

    let report = engine
        .update_from(
            &archive,
            vec![InputSource::named_file("x", temp.path().join("gone.txt"))],
        )
        .unwrap();

    assert!(matches!(report.failures[0].error, PackError::Input { .. }));
    assert_eq!(read_entry(&archive, "x"), content(700, 1));
}

#[test]
fn test_update_from_directory_leaves_entry() {
    let (temp, engine, archive) = setup();
    let dir = temp.path().join("x");
    fs::create_dir(&dir).unwrap();
    let name = dir.to_string_lossy().into_owned();
    engine
        .create(&archive, vec![stream(&name, content(1000, 4))])
        .unwrap();
    let before = engine.list(&archive).unwrap();

    let report = engine.update(&archive, &[name.clone()]).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, PackError::Input { .. }));
    assert_eq!(engine.list(&archive).unwrap(), before);
    assert_eq!(read_entry(&archive, &name), content(1000, 4));
    assert_invariants(&archive);
}

// =============================================================================
// Extract / List Tests
// =============================================================================

#[test]
fn test_extract_selected_names() {
    let (temp, engine, archive) = setup();
    engine
        .create(&archive, vec![stream("a", vec![1]), stream("dir/b", vec![2, 2])])
        .unwrap();
    let out_dir = temp.path().join("out");

    let report = engine
        .extract(&archive, &out_dir, &["dir/b".to_string(), "zzz".to_string()])
        .unwrap();

    assert_eq!(report.completed, vec![("dir/b".to_string(), 2)]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(fs::read(out_dir.join("dir").join("b")).unwrap(), vec![2, 2]);
    assert!(!out_dir.join("a").exists());
}

#[test]
fn test_extract_rejects_parent_components() {
    let (temp, engine, archive) = setup();
    engine
        .create(&archive, vec![stream("../escape", vec![1]), stream("ok", vec![2])])
        .unwrap();
    let out_dir = temp.path().join("out");

    let report = engine.extract(&archive, &out_dir, &[]).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, PackError::InvalidName { .. }));
    assert!(!temp.path().join("escape").exists());
    assert!(out_dir.join("ok").exists());
}

#[test]
fn test_extract_to_writer_concatenates() {
    let (_temp, engine, archive) = setup();
    engine
        .create(&archive, vec![stream("a", b"hello ".to_vec()), stream("b", b"world".to_vec())])
        .unwrap();

    let mut out = Vec::new();
    let report = engine.extract_to_writer(&archive, &[], &mut out).unwrap();

    assert!(report.is_clean());
    assert_eq!(out, b"hello world");
}

#[test]
fn test_list_verbose_render() {
    let (_temp, engine, archive) = setup();
    engine.create(&archive, vec![stream("a", content(600, 0))]).unwrap();

    let entry = engine.list(&archive).unwrap().remove(0);

    assert_eq!(entry.render(false), "a\t600");
    let verbose = entry.render(true);
    let offsets: Vec<String> = entry.block_offsets.iter().map(|o| o.to_string()).collect();
    assert_eq!(verbose, format!("a\t600\t{}", offsets.join(",")));
}

#[test]
fn test_list_is_read_only() {
    let (_temp, engine, archive) = setup();
    engine
        .create(&archive, vec![stream("a", content(900, 1)), stream("b", content(10, 2))])
        .unwrap();
    engine.delete(&archive, &["a".to_string()]).unwrap();
    let before = fs::read(&archive).unwrap();

    let first = engine.list(&archive).unwrap();
    let second = engine.list(&archive).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read(&archive).unwrap(), before);
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_entry_capacity_is_fatal_and_not_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("cap.pack");
    let engine = Engine::new(Config::builder().block_size(BLOCK).max_entries(2).build());
    engine
        .create(&archive, vec![stream("a", vec![1]), stream("b", vec![2])])
        .unwrap();

    let result = engine.append(&archive, vec![stream("c", vec![3])]);

    assert!(matches!(
        result,
        Err(PackError::Capacity { what: "metadata table entries", limit: 2 })
    ));
    let names: Vec<String> = engine.list(&archive).unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_blocks_per_entry_capacity_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("cap.pack");
    let engine = Engine::new(
        Config::builder()
            .block_size(BLOCK)
            .max_blocks_per_entry(2)
            .build(),
    );

    let result = engine.create(&archive, vec![stream("big", content(1500, 0))]);

    assert!(matches!(result, Err(PackError::Capacity { what: "blocks per entry", .. })));
}

#[test]
fn test_free_registry_capacity_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("cap.pack");
    let engine = Engine::new(Config::builder().block_size(BLOCK).max_free_blocks(2).build());
    engine.create(&archive, vec![stream("big", content(2048, 0))]).unwrap();

    let result = engine.delete(&archive, &["big".to_string()]);

    assert!(matches!(result, Err(PackError::Capacity { .. })));
    assert_eq!(engine.list(&archive).unwrap().len(), 1);
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::new(Config::builder().block_size(1000).build());

    let result = engine.create(&temp_dir.path().join("x.pack"), Vec::new());

    assert!(matches!(result, Err(PackError::Config(_))));
}

// =============================================================================
// Execute Tests
// =============================================================================

#[test]
fn test_execute_routes_operations() {
    let (temp, engine, archive) = setup();

    let create = Operation::Create {
        archive: archive.clone(),
        inputs: vec![stream("a", content(700, 1))],
    };
    assert_eq!(create.operation_type(), OperationType::Create);
    assert!(matches!(engine.execute(create).unwrap(), Outcome::Batch(r) if r.is_clean()));

    let list = Operation::List {
        archive: archive.clone(),
        verbose: true,
    };
    assert!(!list.is_mutating());
    match engine.execute(list).unwrap() {
        Outcome::Listing { entries, verbose } => {
            assert!(verbose);
            assert_eq!(entries.len(), 1);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let delete = Operation::Delete {
        archive: archive.clone(),
        names: vec!["nope".to_string()],
    };
    let outcome = engine.execute(delete).unwrap();
    assert!(outcome.has_failures());

    let defrag = Operation::Defragment {
        archive: archive.clone(),
    };
    assert!(matches!(engine.execute(defrag).unwrap(), Outcome::Defragmented(_)));

    let extract = Operation::Extract {
        archive,
        destination: temp.path().join("out"),
        names: Vec::new(),
    };
    assert!(matches!(engine.execute(extract).unwrap(), Outcome::Batch(r) if r.is_clean()));
    assert_eq!(fs::read(temp.path().join("out").join("a")).unwrap(), content(700, 1));
}
