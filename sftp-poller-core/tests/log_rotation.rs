use std::fs;
use std::path::Path;

use filetime::{set_file_mtime, FileTime};
use sftp_poller_core::log_rotation::{LogRotator, LOG_CREATED_MARKER};
use tempfile::tempdir;
use tracing::Level;

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("log file should be readable")
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_first_append_creates_file_with_marker() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("agent.log");
    let mut rotator = LogRotator::new(&log, 1024 * 1024, 3);

    rotator.append("Polling started", Level::INFO).unwrap();

    let content = lines(&log);
    assert_eq!(content.len(), 2);
    assert!(content[0].contains(LOG_CREATED_MARKER));
    assert!(content[1].ends_with("[INFO] Polling started"));
}

#[test]
fn test_append_rotates_before_writing_once_limit_reached() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("agent.log");
    let mut rotator = LogRotator::new(&log, 200, 3);

    let filler = "x".repeat(250);
    rotator.append(&filler, Level::INFO).unwrap();
    assert!(fs::metadata(&log).unwrap().len() >= 200);
    assert!(rotator.archives().unwrap().is_empty());

    rotator.append("trigger", Level::ERROR).unwrap();

    let archives = rotator.archives().unwrap();
    assert_eq!(archives.len(), 1, "Exactly one archive after one rotation");
    let archived = fs::read_to_string(&archives[0]).unwrap();
    assert!(archived.contains(&filler));
    assert!(
        !archived.contains("trigger"),
        "The triggering message must not land in the archive"
    );

    let active = lines(&log);
    assert_eq!(active.len(), 2, "Fresh file holds the marker plus the new line");
    assert!(active[0].contains(LOG_CREATED_MARKER));
    assert!(active[1].ends_with("[ERROR] trigger"));
}

#[test]
fn test_rotation_leaves_only_the_marker_line() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("agent.log");
    let mut rotator = LogRotator::new(&log, 64, 3);
    rotator.append(&"y".repeat(100), Level::INFO).unwrap();

    rotator.rotate().unwrap();

    let content = fs::read_to_string(&log).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains(LOG_CREATED_MARKER));
    assert_eq!(fs::metadata(&log).unwrap().len(), content.len() as u64);
}

#[test]
fn test_archive_name_uses_stem_timestamp_and_extension() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("agent.log");
    let mut rotator = LogRotator::new(&log, 64, 3);
    rotator.append("hello", Level::INFO).unwrap();

    let archive = rotator.rotate().unwrap();
    let name = archive.file_name().unwrap().to_str().unwrap().to_owned();

    assert!(name.starts_with("agent_"), "got {name}");
    assert!(name.ends_with(".log"), "got {name}");
    // agent_yyyyMMdd_HHmmss.log
    let stamp = &name["agent_".len().."agent_".len() + 15];
    assert!(stamp[..8].chars().all(|c| c.is_ascii_digit()), "got {name}");
    assert_eq!(&stamp[8..9], "_");
    assert!(stamp[9..].chars().all(|c| c.is_ascii_digit()), "got {name}");
}

#[test]
fn test_prune_deletes_exactly_the_oldest_by_mtime() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("agent.log");
    fs::write(&log, "active\n").unwrap();

    // Name order deliberately disagrees with mtime order.
    let archives = [
        ("agent_20260105_000000.log", 1_000),
        ("agent_20260101_000000.log", 5_000),
        ("agent_20260104_000000.log", 2_000),
        ("agent_20260102_000000.log", 4_000),
        ("agent_20260103_000000.log", 3_000),
    ];
    for (name, mtime) in archives {
        let path = dir.path().join(name);
        fs::write(&path, name).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    let rotator = LogRotator::new(&log, 1024, 2);
    let mut deleted: Vec<String> = rotator
        .prune_archives()
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    deleted.sort();

    assert_eq!(
        deleted,
        vec![
            "agent_20260103_000000.log".to_string(),
            "agent_20260104_000000.log".to_string(),
            "agent_20260105_000000.log".to_string(),
        ]
    );
    let remaining = rotator.archives().unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(dir.path().join("agent_20260101_000000.log").exists());
    assert!(dir.path().join("agent_20260102_000000.log").exists());
}

#[test]
fn test_archive_count_never_exceeds_retention() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("agent.log");
    let mut rotator = LogRotator::new(&log, 32, 3);

    for i in 0..10 {
        rotator
            .append(&format!("event number {i} with some padding"), Level::INFO)
            .unwrap();
        assert!(rotator.archives().unwrap().len() <= 3);
    }
    assert_eq!(rotator.archives().unwrap().len(), 3);
}

#[test]
fn test_prune_ignores_unrelated_files() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("agent.log");
    fs::write(&log, "active\n").unwrap();
    for name in [
        "agent.log.bak",
        "other_20260101_000000.log",
        "agent_20260101_000000.txt",
        "agent_latest.log",
    ] {
        fs::write(dir.path().join(name), "keep").unwrap();
    }

    let rotator = LogRotator::new(&log, 1024, 1);
    assert!(rotator.prune_archives().unwrap().is_empty());
    assert!(dir.path().join("agent.log.bak").exists());
    assert!(dir.path().join("other_20260101_000000.log").exists());
}
