use super::*;
use crate::callback::NoOpCallback;
use crate::config::{PathMode, TimestampConfig};
use crate::fs::{FileInfo, READONLY_ATTRIBUTE};
use crate::types::{OverwriteAnswer, PropValue};
use chrono::TimeZone;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FakeItem {
    path: String,
    is_dir: bool,
    is_anti: bool,
    encrypted: bool,
    position: Option<u64>,
    attrib: Option<u32>,
    mtime: Option<DateTime<Utc>>,
    data: Vec<u8>,
    result: i32,
}

fn file(path: &str, data: &[u8]) -> FakeItem {
    FakeItem {
        path: path.to_string(),
        data: data.to_vec(),
        ..Default::default()
    }
}

fn dir(path: &str) -> FakeItem {
    FakeItem {
        path: path.to_string(),
        is_dir: true,
        ..Default::default()
    }
}

/// In-memory archive that records what the session handed it
#[derive(Default)]
struct FakeArchive {
    items: Vec<FakeItem>,
    mtime: Option<DateTime<Utc>>,
    packed: u64,
    overrides: HashMap<(u32, PropId), PropValue>,
    done: u64,
    had_stream: Vec<bool>,
    modes: Vec<AskMode>,
    passwords: Vec<Option<String>>,
}

impl FakeArchive {
    fn new(items: Vec<FakeItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }
}

impl ArchiveReader for FakeArchive {
    fn property(&self, index: u32, prop: PropId) -> Result<PropValue> {
        if let Some(value) = self.overrides.get(&(index, prop)) {
            return Ok(value.clone());
        }
        let item = &self.items[index as usize];
        Ok(match prop {
            PropId::Path => PropValue::Str(item.path.clone()),
            PropId::IsDir => PropValue::Bool(item.is_dir),
            PropId::IsAnti => PropValue::Bool(item.is_anti),
            PropId::Encrypted => PropValue::Bool(item.encrypted),
            PropId::Position => item.position.map_or(PropValue::Empty, PropValue::U64),
            PropId::Size if item.is_dir || item.is_anti => PropValue::Empty,
            PropId::Size => PropValue::U64(item.data.len() as u64),
            PropId::Attrib => item.attrib.map_or(PropValue::Empty, PropValue::U32),
            PropId::MTime => item.mtime.map_or(PropValue::Empty, PropValue::Time),
            PropId::CTime | PropId::ATime => PropValue::Empty,
        })
    }

    fn archive_mtime(&self) -> Option<DateTime<Utc>> {
        self.mtime
    }
}

impl ArchiveEngine for FakeArchive {
    fn item_count(&self) -> u32 {
        self.items.len() as u32
    }

    fn total_unpacked(&self) -> Option<u64> {
        Some(self.items.iter().map(|i| i.data.len() as u64).sum())
    }

    fn packed_size(&self) -> u64 {
        self.packed
    }

    fn extract(
        &mut self,
        index: u32,
        mode: AskMode,
        out: Option<&mut dyn Write>,
        progress: &mut dyn ProgressSink,
    ) -> Result<OperationResult> {
        let item = self.items[index as usize].clone();
        self.had_stream.push(out.is_some());
        self.modes.push(mode);

        if item.encrypted {
            self.passwords.push(progress.password()?);
        }
        if mode != AskMode::Skip {
            if let Some(out) = out {
                out.write_all(&item.data)?;
            }
            self.done += item.data.len() as u64;
            progress.completed(self.done)?;
        }
        Ok(OperationResult::from_code(item.result))
    }
}

/// Callback that records every notification
#[derive(Default)]
struct Recorder {
    answers: VecDeque<OverwriteAnswer>,
    prompts: Vec<OverwriteRequest>,
    errors: Vec<&'static str>,
    prepared: Vec<(String, AskMode, Option<u64>)>,
    results: Vec<(OperationResult, bool)>,
    totals: Vec<u64>,
    completed: Vec<u64>,
    password: Option<String>,
    password_prompts: u32,
    abort_at: Option<u64>,
}

impl ExtractCallback for Recorder {
    fn set_total(&mut self, total: u64) {
        self.totals.push(total);
    }

    fn set_completed(&mut self, completed: u64) -> Result<()> {
        self.completed.push(completed);
        match self.abort_at {
            Some(limit) if completed >= limit => Err(Error::Aborted),
            _ => Ok(()),
        }
    }

    fn ask_overwrite(&mut self, request: &OverwriteRequest) -> Result<OverwriteAnswer> {
        self.prompts.push(request.clone());
        Ok(self.answers.pop_front().unwrap_or(OverwriteAnswer::No))
    }

    fn prepare_operation(
        &mut self,
        item_path: &str,
        _is_dir: bool,
        mode: AskMode,
        position: Option<u64>,
    ) {
        self.prepared.push((item_path.to_string(), mode, position));
    }

    fn message_error(&mut self, error: &ItemError) {
        self.errors.push(error.error_code());
    }

    fn set_operation_result(&mut self, result: OperationResult, encrypted: bool) -> Result<()> {
        self.results.push((result, encrypted));
        Ok(())
    }

    fn get_password(&mut self) -> Result<Option<String>> {
        self.password_prompts += 1;
        Ok(self.password.clone())
    }
}

/// Local filesystem with injectable failures
struct FailingFs {
    fail_delete: bool,
    fail_open: Option<&'static str>,
}

impl FileSystem for FailingFs {
    fn find(&self, path: &Path) -> Option<FileInfo> {
        LocalFileSystem.find(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        LocalFileSystem.create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        LocalFileSystem.remove_dir(path)
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        if self.fail_delete {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
        }
        LocalFileSystem.delete_file(path)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        LocalFileSystem.move_file(from, to)
    }

    fn set_times(&self, path: &Path, times: &TimesToSet) -> io::Result<()> {
        LocalFileSystem.set_times(path, times)
    }

    fn set_attributes(&self, path: &Path, attributes: u32) -> io::Result<()> {
        LocalFileSystem.set_attributes(path, attributes)
    }

    fn open_output(&self, path: &Path, truncate: bool) -> io::Result<File> {
        if self.fail_open.is_some_and(|name| path.ends_with(name)) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"));
        }
        LocalFileSystem.open_output(path, truncate)
    }
}

/// Local filesystem that records directory creations and deletions
#[derive(Clone, Default)]
struct RecordingFs {
    created: Rc<RefCell<Vec<PathBuf>>>,
    deleted: Rc<RefCell<Vec<PathBuf>>>,
}

impl FileSystem for RecordingFs {
    fn find(&self, path: &Path) -> Option<FileInfo> {
        LocalFileSystem.find(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        self.created.borrow_mut().push(path.to_path_buf());
        LocalFileSystem.create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        LocalFileSystem.remove_dir(path)
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.deleted.borrow_mut().push(path.to_path_buf());
        LocalFileSystem.delete_file(path)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        LocalFileSystem.move_file(from, to)
    }

    fn set_times(&self, path: &Path, times: &TimesToSet) -> io::Result<()> {
        LocalFileSystem.set_times(path, times)
    }

    fn set_attributes(&self, path: &Path, attributes: u32) -> io::Result<()> {
        LocalFileSystem.set_attributes(path, attributes)
    }

    fn open_output(&self, path: &Path, truncate: bool) -> io::Result<File> {
        LocalFileSystem.open_output(path, truncate)
    }
}

/// Merger that captures payload contents at merge time
#[derive(Clone, Default)]
struct RecordingMerger {
    merged: Rc<RefCell<Vec<(Vec<u8>, PathBuf)>>>,
    fail: bool,
}

impl MetadataMerger for RecordingMerger {
    fn merge(&self, payload: &Path, target: &Path) -> io::Result<()> {
        let bytes = std::fs::read(payload)?;
        self.merged.borrow_mut().push((bytes, target.to_path_buf()));
        if self.fail {
            return Err(io::Error::other("xattr write failed"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn config(dest: &TempDir) -> ExtractionConfig {
    let mut config = ExtractionConfig::new(dest.path());
    config.sidecar_metadata = false;
    config
}

fn read(dest: &TempDir, relative: &str) -> String {
    std::fs::read_to_string(dest.path().join(relative)).unwrap()
}

fn entries(dest: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dest.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Basic extraction
// ---------------------------------------------------------------------------

#[test]
fn extracts_files_and_directories() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut archive = FakeArchive::new(vec![
        dir("docs"),
        file("docs/a.txt", b"alpha"),
        file("b.txt", b"bravo!"),
    ]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(read(&dest, "docs/a.txt"), "alpha");
    assert_eq!(read(&dest, "b.txt"), "bravo!");
    assert_eq!(summary.files, 2);
    assert_eq!(summary.folders, 1);
    assert_eq!(summary.unpacked_size, 11);
    assert_eq!(archive.had_stream, vec![false, true, true]);
    assert_eq!(recorder.totals, vec![11]);
    assert_eq!(recorder.completed.last(), Some(&11));
    assert!(
        recorder
            .results
            .iter()
            .all(|(r, _)| *r == OperationResult::Ok)
    );
}

#[test]
fn flat_mode_keeps_only_file_names() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.path_mode = PathMode::Flat;
    let mut archive = FakeArchive::new(vec![file("a/b/c.txt", b"deep")]);

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    assert_eq!(entries(&dest), vec!["c.txt"]);
    assert_eq!(read(&dest, "c.txt"), "deep");
}

#[test]
fn current_mode_strips_prefix() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.path_mode = PathMode::Current {
        remove_prefix: vec!["Project".into()],
    };
    let mut archive = FakeArchive::new(vec![file("project/src/main.rs", b"fn main() {}")]);

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    assert_eq!(read(&dest, "src/main.rs"), "fn main() {}");
}

#[test]
fn prefix_mismatch_is_fatal() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.path_mode = PathMode::Current {
        remove_prefix: vec!["project".into()],
    };
    let mut archive = FakeArchive::new(vec![file("other/x.txt", b"x")]);

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    let err = session.run(&mut archive).unwrap_err();

    assert!(matches!(err, Error::PrefixMismatch { .. }));
    assert_eq!(session.item_state(), None);
}

#[test]
fn path_of_only_dots_is_malformed() {
    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![file("../..", b"x")]);

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    let err = session.run(&mut archive).unwrap_err();

    assert!(matches!(err, Error::MalformedPath { .. }));
    assert!(entries(&dest).is_empty());
}

#[test]
fn traversal_components_are_dropped() {
    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![file("../../etc/passwd", b"root")]);

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    assert_eq!(read(&dest, "etc/passwd"), "root");
}

#[test]
fn wrong_property_type_is_fatal() {
    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![file("a.txt", b"a")]);
    archive
        .overrides
        .insert((0, PropId::IsDir), PropValue::U32(1));

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    let err = session.run(&mut archive).unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidPropertyType {
            index: 0,
            property: PropId::IsDir,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Lifecycle ordering
// ---------------------------------------------------------------------------

#[test]
fn prepare_before_get_stream_is_rejected() {
    let dest = TempDir::new().unwrap();
    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();

    let err = session.prepare_operation(AskMode::Extract).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            operation: "prepare_operation",
            state: "idle"
        }
    ));
}

#[test]
fn manual_protocol_walks_every_state() {
    let dest = TempDir::new().unwrap();
    let archive = FakeArchive::new(vec![file("a.txt", b"hello"), file("b.txt", b"")]);
    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();

    assert!(session.get_stream(&archive, 0, AskMode::Extract).unwrap());
    assert_eq!(session.item_state(), Some(ItemState::StreamAssigned));

    let err = session.get_stream(&archive, 1, AskMode::Extract).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            state: "stream_assigned",
            ..
        }
    ));
    let err = session.set_operation_result(&archive, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));

    assert_eq!(session.prepare_operation(AskMode::Extract).unwrap(), AskMode::Extract);
    assert_eq!(session.item_state(), Some(ItemState::Prepared));
    session.writer().unwrap().write_all(b"hello").unwrap();
    session.set_operation_result(&archive, 0).unwrap();
    assert_eq!(session.item_state(), Some(ItemState::ResultRecorded));

    let err = session.set_operation_result(&archive, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            state: "result_recorded",
            ..
        }
    ));

    assert!(session.get_stream(&archive, 1, AskMode::Extract).unwrap());
    session.prepare_operation(AskMode::Extract).unwrap();
    session.set_operation_result(&archive, 0).unwrap();

    let summary = session.finish().unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(read(&dest, "a.txt"), "hello");
    assert_eq!(read(&dest, "b.txt"), "");
}

#[test]
fn finish_with_item_in_flight_is_rejected() {
    let dest = TempDir::new().unwrap();
    let archive = FakeArchive::new(vec![file("a.txt", b"a")]);
    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();

    session.get_stream(&archive, 0, AskMode::Extract).unwrap();
    session.prepare_operation(AskMode::Extract).unwrap();

    let err = session.finish().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            operation: "finish",
            state: "prepared"
        }
    ));
}

#[test]
fn skip_mode_gets_no_stream_and_is_not_counted() {
    let dest = TempDir::new().unwrap();
    let archive = FakeArchive::new(vec![file("a.txt", b"a")]);
    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();

    assert!(!session.get_stream(&archive, 0, AskMode::Skip).unwrap());
    session.prepare_operation(AskMode::Skip).unwrap();
    session.set_operation_result(&archive, 0).unwrap();

    let summary = session.finish().unwrap();
    assert_eq!(summary.files, 0);
    assert!(entries(&dest).is_empty());
}

// ---------------------------------------------------------------------------
// Result codes
// ---------------------------------------------------------------------------

#[test]
fn soft_failures_are_recorded_and_run_continues() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut archive = FakeArchive::new(vec![
        FakeItem {
            result: 3,
            ..file("bad.txt", b"garbage")
        },
        file("good.txt", b"fine"),
    ]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(
        recorder.results,
        vec![(OperationResult::CrcError, false), (OperationResult::Ok, false)]
    );
}

#[test]
fn unknown_result_code_fails_run() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut archive = FakeArchive::new(vec![
        FakeItem {
            result: 9,
            ..file("a.txt", b"a")
        },
        file("b.txt", b"b"),
    ]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    let err = session.run(&mut archive).unwrap_err();

    assert!(matches!(err, Error::ItemFailed { index: 0, code: 9 }));
    assert_eq!(session.item_state(), None);
    drop(session);
    assert!(recorder.results.is_empty());
    assert!(!dest.path().join("b.txt").exists());
}

#[test]
fn declared_sizes_saturate_instead_of_overflowing() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.test = true;
    let mut archive = FakeArchive::new(vec![file("a.bin", b""), file("b.bin", b"")]);
    archive.overrides.insert((0, PropId::Size), PropValue::U64(u64::MAX));
    archive.overrides.insert((1, PropId::Size), PropValue::U64(u64::MAX));

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(summary.unpacked_size, u64::MAX);
}

// ---------------------------------------------------------------------------
// Test, stdout and checksum modes
// ---------------------------------------------------------------------------

#[test]
fn test_mode_decodes_without_writing() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut cfg = config(&dest);
    cfg.test = true;
    let mut archive = FakeArchive::new(vec![
        dir("docs"),
        file("docs/a.txt", b"alpha"),
        FakeItem {
            attrib: Some(READONLY_ATTRIBUTE),
            ..file("b.txt", b"bravo")
        },
    ]);

    let mut session = ExtractSession::new(cfg, &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert!(entries(&dest).is_empty());
    assert_eq!(summary.files, 2);
    assert_eq!(summary.folders, 1);
    assert_eq!(summary.unpacked_size, 10);
    assert_eq!(archive.had_stream, vec![false, true, true]);
    assert!(recorder.prepared.iter().all(|(_, m, _)| *m == AskMode::Test));
    assert_eq!(archive.modes, vec![AskMode::Test; 3]);
}

#[test]
fn checksum_sums_item_crcs() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.checksum = true;
    let mut archive = FakeArchive::new(vec![file("a.txt", b"alpha"), file("b.txt", b"bravo")]);

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    let expected = crc32fast::hash(b"alpha").wrapping_add(crc32fast::hash(b"bravo"));
    assert_eq!(summary.crc_sum, expected);
    assert_eq!(summary.unpacked_size, 10);
    assert_eq!(read(&dest, "a.txt"), "alpha");
}

#[test]
fn stdout_mode_creates_nothing_on_disk() {
    let dest = TempDir::new().unwrap();
    let target = dest.path().join("never-created");
    let mut cfg = ExtractionConfig::new(&target);
    cfg.stdout = true;
    cfg.checksum = true;
    let mut archive = FakeArchive::new(vec![dir("d"), file("d/a.txt", b"")]);

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert!(!target.exists());
    assert_eq!(archive.had_stream, vec![false, true]);
    assert_eq!(summary.files, 1);
    assert_eq!(summary.crc_sum, 0);
}

// ---------------------------------------------------------------------------
// Filters, anti items and splits
// ---------------------------------------------------------------------------

#[test]
fn filtered_items_are_skipped_silently() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut archive = FakeArchive::new(vec![file("keep.txt", b"k"), file("drop.log", b"d")]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder)
        .unwrap()
        .with_filter(|path: &str, _is_dir: bool| !path.ends_with(".log"));
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(entries(&dest), vec!["keep.txt"]);
    assert_eq!(summary.files, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(archive.modes, vec![AskMode::Extract, AskMode::Skip]);
    assert_eq!(recorder.prepared[1].1, AskMode::Skip);
}

#[test]
fn anti_items_remove_existing_entries() {
    let dest = TempDir::new().unwrap();
    std::fs::create_dir(dest.path().join("old")).unwrap();
    std::fs::write(dest.path().join("stale.txt"), "stale").unwrap();
    let mut archive = FakeArchive::new(vec![
        FakeItem {
            is_anti: true,
            ..dir("old")
        },
        FakeItem {
            is_anti: true,
            ..file("stale.txt", b"")
        },
        FakeItem {
            is_anti: true,
            ..file("absent.txt", b"")
        },
    ]);

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert!(entries(&dest).is_empty());
    assert_eq!(archive.had_stream, vec![false, false, false]);
    assert_eq!(summary.files, 0);
    assert_eq!(summary.folders, 0);
}

#[test]
fn anti_directory_that_is_not_empty_is_left_in_place() {
    let dest = TempDir::new().unwrap();
    std::fs::create_dir(dest.path().join("keep")).unwrap();
    std::fs::write(dest.path().join("keep").join("inner.txt"), "x").unwrap();
    let mut archive = FakeArchive::new(vec![
        FakeItem {
            is_anti: true,
            ..dir("keep")
        },
        file("next.txt", b"n"),
    ]);

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(entries(&dest), vec!["keep", "next.txt"]);
    assert_eq!(read(&dest, "keep/inner.txt"), "x");
    assert_eq!(summary.files, 1);
    assert_eq!(summary.folders, 0);
}

#[test]
fn split_fragments_continue_the_same_file() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut archive = FakeArchive::new(vec![
        file("big.bin", b"AAAA"),
        FakeItem {
            position: Some(4),
            ..file("big.bin", b"BBBB")
        },
    ]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(read(&dest, "big.bin"), "AAAABBBB");
    assert_eq!(summary.unpacked_size, 8);
    assert!(recorder.prompts.is_empty());
    let positions: Vec<_> = recorder.prepared.iter().map(|(_, _, p)| *p).collect();
    assert_eq!(positions, vec![None, Some(4)]);
}

// ---------------------------------------------------------------------------
// Overwrite handling
// ---------------------------------------------------------------------------

#[test]
fn auto_rename_answer_is_sticky() {
    let dest = TempDir::new().unwrap();
    std::fs::write(dest.path().join("x.txt"), "old-x").unwrap();
    std::fs::write(dest.path().join("y.txt"), "old-y").unwrap();
    let mut recorder = Recorder {
        answers: VecDeque::from([OverwriteAnswer::AutoRename]),
        ..Default::default()
    };
    let mut archive = FakeArchive::new(vec![file("x.txt", b"new-x"), file("y.txt", b"new-y")]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    assert_eq!(session.overwrite_mode(), OverwriteMode::AutoRename);
    session.finish().unwrap();

    assert_eq!(recorder.prompts.len(), 1);
    assert_eq!(recorder.prompts[0].item_path, "x.txt");
    assert_eq!(recorder.prompts[0].existing_size, 5);
    assert_eq!(read(&dest, "x.txt"), "old-x");
    assert_eq!(read(&dest, "x (1).txt"), "new-x");
    assert_eq!(read(&dest, "y.txt"), "old-y");
    assert_eq!(read(&dest, "y (1).txt"), "new-y");
}

#[test]
fn declined_prompt_skips_item() {
    let dest = TempDir::new().unwrap();
    std::fs::write(dest.path().join("a.txt"), "keep").unwrap();
    let mut recorder = Recorder::default();
    let mut archive = FakeArchive::new(vec![file("a.txt", b"replace"), file("b.txt", b"b")]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(read(&dest, "a.txt"), "keep");
    assert_eq!(summary.files, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.warnings, 0);
    assert_eq!(archive.had_stream, vec![false, true]);
}

#[test]
fn cancel_answer_aborts_run() {
    let dest = TempDir::new().unwrap();
    std::fs::write(dest.path().join("a.txt"), "keep").unwrap();
    let mut recorder = Recorder {
        answers: VecDeque::from([OverwriteAnswer::Cancel]),
        ..Default::default()
    };
    let mut archive = FakeArchive::new(vec![file("a.txt", b"replace"), file("b.txt", b"b")]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    let err = session.run(&mut archive).unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(read(&dest, "a.txt"), "keep");
    assert!(!dest.path().join("b.txt").exists());
}

#[test]
fn delete_failure_reports_and_skips() {
    let dest = TempDir::new().unwrap();
    std::fs::write(dest.path().join("a.txt"), "old").unwrap();
    let mut recorder = Recorder::default();
    let mut cfg = config(&dest);
    cfg.overwrite_mode = OverwriteMode::WithoutPrompt;
    let mut archive = FakeArchive::new(vec![file("a.txt", b"new"), file("b.txt", b"b")]);

    let mut session = ExtractSession::new(cfg, &mut recorder)
        .unwrap()
        .with_file_system(FailingFs {
            fail_delete: true,
            fail_open: None,
        });
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(recorder.errors, vec!["cannot_delete_output_file"]);
    assert_eq!(read(&dest, "a.txt"), "old");
    assert_eq!(read(&dest, "b.txt"), "b");
    assert_eq!(summary.files, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.warnings, 1);
}

#[test]
fn open_failure_reports_and_continues() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut archive = FakeArchive::new(vec![file("bad.txt", b"x"), file("ok.txt", b"y")]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder)
        .unwrap()
        .with_file_system(FailingFs {
            fail_delete: false,
            fail_open: Some("bad.txt"),
        });
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert_eq!(recorder.errors, vec!["cannot_open_output_file"]);
    assert_eq!(entries(&dest), vec!["ok.txt"]);
    assert_eq!(summary.warnings, 1);
}

// ---------------------------------------------------------------------------
// Times and attributes
// ---------------------------------------------------------------------------

#[test]
fn modification_time_is_stamped() {
    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![
        FakeItem {
            mtime: Some(at(1_000_000_000)),
            ..file("dated.txt", b"d")
        },
        file("undated.txt", b"u"),
    ]);
    archive.mtime = Some(at(1_200_000_000));

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    let mtime = |name: &str| {
        let meta = std::fs::metadata(dest.path().join(name)).unwrap();
        DateTime::<Utc>::from(meta.modified().unwrap())
    };
    assert_eq!(mtime("dated.txt"), at(1_000_000_000));
    assert_eq!(mtime("undated.txt"), at(1_200_000_000));
}

#[test]
fn directory_items_are_stamped_at_creation() {
    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![
        FakeItem {
            mtime: Some(at(900_000_000)),
            ..dir("dated")
        },
        dir("undated"),
    ]);
    archive.mtime = Some(at(1_300_000_000));

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    let mtime = |name: &str| {
        let meta = std::fs::metadata(dest.path().join(name)).unwrap();
        DateTime::<Utc>::from(meta.modified().unwrap())
    };
    assert!(dest.path().join("dated").is_dir());
    assert_eq!(mtime("dated"), at(900_000_000));
    assert_eq!(mtime("undated"), at(1_300_000_000));
    assert_eq!(summary.folders, 2);
}

#[test]
fn disabled_modification_flag_leaves_times_alone() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.timestamps = TimestampConfig {
        modification: false,
        ..Default::default()
    };
    let mut archive = FakeArchive::new(vec![FakeItem {
        mtime: Some(at(1_000_000_000)),
        ..file("a.txt", b"a")
    }]);

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    let meta = std::fs::metadata(dest.path().join("a.txt")).unwrap();
    assert_ne!(DateTime::<Utc>::from(meta.modified().unwrap()), at(1_000_000_000));
}

#[test]
fn readonly_attribute_applied_in_extract_mode() {
    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![FakeItem {
        attrib: Some(READONLY_ATTRIBUTE),
        ..file("locked.txt", b"l")
    }]);

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    let meta = std::fs::metadata(dest.path().join("locked.txt")).unwrap();
    assert!(meta.permissions().readonly());
}

#[cfg(unix)]
#[test]
fn archive_mode_bits_never_set_setuid() {
    use crate::fs::UNIX_EXTENSION_FLAG;
    use std::os::unix::fs::PermissionsExt;

    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![FakeItem {
        attrib: Some((0o4777 << 16) | UNIX_EXTENSION_FLAG),
        ..file("tool", b"#!/bin/sh\n")
    }]);

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    let mode = std::fs::metadata(dest.path().join("tool"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o7777, 0o777);
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

#[test]
fn destination_is_created_through_the_file_system() {
    let dest = TempDir::new().unwrap();
    let root = dest.path().join("out").join("nested");
    let fs = RecordingFs::default();
    let mut archive = FakeArchive::new(vec![file("a.txt", b"a")]);

    let mut session = ExtractSession::new(ExtractionConfig::new(&root), NoOpCallback)
        .unwrap()
        .with_file_system(fs.clone());
    assert!(!root.exists());
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    assert_eq!(
        *fs.created.borrow(),
        vec![dest.path().join("out"), root.clone()]
    );
    assert_eq!(std::fs::read_to_string(root.join("a.txt")).unwrap(), "a");
}

#[test]
fn unusable_destination_fails_the_run() {
    let dest = TempDir::new().unwrap();
    std::fs::write(dest.path().join("blocker"), "x").unwrap();
    let root = dest.path().join("blocker").join("out");
    let mut archive = FakeArchive::new(vec![file("a.txt", b"a")]);

    let mut session = ExtractSession::new(ExtractionConfig::new(&root), NoOpCallback).unwrap();
    let err = session.run(&mut archive).unwrap_err();

    assert_eq!(err.error_code(), "io_error");
}

// ---------------------------------------------------------------------------
// Progress and passwords
// ---------------------------------------------------------------------------

#[test]
fn progress_error_cancels_run() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder {
        abort_at: Some(1),
        ..Default::default()
    };
    let mut archive = FakeArchive::new(vec![file("a.txt", b"a"), file("b.txt", b"b")]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    let err = session.run(&mut archive).unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(session.item_state(), None);
    assert!(!dest.path().join("b.txt").exists());
}

#[test]
fn multi_volume_progress_is_reported_in_packed_bytes() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut cfg = config(&dest);
    cfg.multi_volume = true;
    cfg.packed_size = 200;
    let mut volumes = vec![
        FakeArchive {
            packed: 100,
            ..FakeArchive::new(vec![file("a.bin", &[0; 10])])
        },
        FakeArchive {
            packed: 100,
            ..FakeArchive::new(vec![file("b.bin", &[0; 20])])
        },
    ];

    let mut session = ExtractSession::new(cfg, &mut recorder).unwrap();
    session.run_volumes(&mut volumes).unwrap();
    session.finish().unwrap();

    assert_eq!(recorder.totals, vec![200]);
    assert_eq!(recorder.completed, vec![100, 200]);
}

#[test]
fn configured_password_never_prompts() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder::default();
    let mut cfg = config(&dest);
    cfg.password = Some("secret".into());
    let mut archive = FakeArchive::new(vec![FakeItem {
        encrypted: true,
        ..file("a.txt", b"a")
    }]);

    let mut session = ExtractSession::new(cfg, &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    assert_eq!(archive.passwords, vec![Some("secret".to_string())]);
    assert_eq!(recorder.password_prompts, 0);
    assert_eq!(recorder.results, vec![(OperationResult::Ok, true)]);
}

#[test]
fn password_prompt_is_asked_once() {
    let dest = TempDir::new().unwrap();
    let mut recorder = Recorder {
        password: Some("typed".into()),
        ..Default::default()
    };
    let encrypted = |name: &str| FakeItem {
        encrypted: true,
        ..file(name, b"e")
    };
    let mut archive = FakeArchive::new(vec![encrypted("a.txt"), encrypted("b.txt")]);

    let mut session = ExtractSession::new(config(&dest), &mut recorder).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    assert_eq!(recorder.password_prompts, 1);
    assert_eq!(archive.passwords, vec![Some("typed".to_string()); 2]);
}

// ---------------------------------------------------------------------------
// Sidecars
// ---------------------------------------------------------------------------

#[test]
fn sidecar_payload_is_merged_after_its_target_exists() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.sidecar_metadata = true;
    let merger = RecordingMerger::default();
    let mut archive = FakeArchive::new(vec![
        file("__MACOSX/docs/._report.txt", b"meta"),
        dir("docs"),
        file("docs/report.txt", b"body"),
    ]);

    let mut session = ExtractSession::new(cfg, NoOpCallback)
        .unwrap()
        .with_metadata_merger(merger.clone());
    session.run(&mut archive).unwrap();

    let pending = session.pending_sidecars().to_vec();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].target, dest.path().join("docs").join("report.txt"));
    assert!(pending[0].payload.exists());

    let summary = session.finish().unwrap();

    assert_eq!(summary.sidecars_merged, 1);
    assert_eq!(
        *merger.merged.borrow(),
        vec![(b"meta".to_vec(), dest.path().join("docs").join("report.txt"))]
    );
    assert!(!pending[0].payload.exists());
    assert_eq!(entries(&dest), vec!["docs"]);
    assert_eq!(read(&dest, "docs/report.txt"), "body");
}

#[test]
fn sidecar_container_noise_is_skipped() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.sidecar_metadata = true;
    let mut archive = FakeArchive::new(vec![
        dir("__MACOSX"),
        dir("__MACOSX/docs"),
        file("__MACOSX/readme", b"noise"),
    ]);

    let mut session = ExtractSession::new(cfg, NoOpCallback)
        .unwrap()
        .with_metadata_merger(RecordingMerger::default());
    session.run(&mut archive).unwrap();
    let summary = session.finish().unwrap();

    assert!(entries(&dest).is_empty());
    assert_eq!(summary.files, 0);
    assert_eq!(summary.folders, 0);
    assert_eq!(archive.had_stream, vec![false; 3]);
}

#[test]
fn dropping_session_removes_staging() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.sidecar_metadata = true;
    let mut archive = FakeArchive::new(vec![file("._a.txt", b"meta")]);

    let mut session = ExtractSession::new(cfg, NoOpCallback)
        .unwrap()
        .with_metadata_merger(RecordingMerger::default());
    session.run(&mut archive).unwrap();
    assert_eq!(entries(&dest).len(), 1);

    drop(session);
    assert!(entries(&dest).is_empty());
}

#[test]
fn sidecars_are_plain_files_when_disabled() {
    let dest = TempDir::new().unwrap();
    let mut archive = FakeArchive::new(vec![file("._a.txt", b"meta")]);

    let mut session = ExtractSession::new(config(&dest), NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    session.finish().unwrap();

    assert_eq!(read(&dest, "._a.txt"), "meta");
}

#[test]
fn sidecars_are_plain_files_without_a_merger() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.sidecar_metadata = true;
    let mut archive = FakeArchive::new(vec![
        file("report.txt", b"body"),
        file("._report.txt", b"meta"),
    ]);

    let mut session = ExtractSession::new(cfg, NoOpCallback).unwrap();
    session.run(&mut archive).unwrap();
    assert!(session.pending_sidecars().is_empty());
    let summary = session.finish().unwrap();

    assert_eq!(entries(&dest), vec!["._report.txt", "report.txt"]);
    assert_eq!(read(&dest, "._report.txt"), "meta");
    assert_eq!(summary.files, 2);
}

#[test]
fn failed_merges_count_as_warnings() {
    let dest = TempDir::new().unwrap();
    let mut cfg = config(&dest);
    cfg.sidecar_metadata = true;
    let fs = RecordingFs::default();
    let merger = RecordingMerger {
        fail: true,
        ..Default::default()
    };
    let mut archive = FakeArchive::new(vec![
        file("a.txt", b"a"),
        file("._a.txt", b"meta"),
    ]);

    let mut session = ExtractSession::new(cfg, NoOpCallback)
        .unwrap()
        .with_file_system(fs.clone())
        .with_metadata_merger(merger.clone());
    session.run(&mut archive).unwrap();
    let payload = session.pending_sidecars()[0].payload.clone();
    let summary = session.finish().unwrap();

    assert_eq!(merger.merged.borrow().len(), 1);
    assert_eq!(summary.sidecars_merged, 0);
    assert_eq!(summary.warnings, 1);
    assert_eq!(*fs.deleted.borrow(), vec![payload]);
    assert_eq!(entries(&dest), vec!["a.txt"]);
}
