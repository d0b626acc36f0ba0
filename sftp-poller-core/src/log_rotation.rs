//! Size-bounded active log file with count-bounded timestamped archives.
//!
//! [`LogRotator::append`] checks the active file size before every write. Once
//! the size reaches the ceiling, the active file is renamed to
//! `<stem>_<yyyyMMdd_HHmmss><ext>`, a fresh file holding a single marker line
//! takes its place, and the oldest archives are deleted until at most
//! `max_archives` remain. Only then is the triggering message written, so it
//! always lands in the fresh file.
//!
//! The rotator sits underneath the tracing layer, so it must never emit
//! tracing events itself.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use regex::Regex;
use tracing::Level;

/// Text of the first line of every fresh active log file.
pub const LOG_CREATED_MARKER: &str = "Log file created";

const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub struct LogRotator {
    path: PathBuf,
    size_limit_bytes: u64,
    max_archives: usize,
    archive_pattern: Regex,
}

impl LogRotator {
    pub fn new(path: impl Into<PathBuf>, size_limit_bytes: u64, max_archives: usize) -> Self {
        let path = path.into();
        let (stem, ext) = split_name(&path);
        let archive_pattern = Regex::new(&format!(
            r"^{}_\d{{8}}_\d{{6}}(?:_\d+)?{}$",
            regex::escape(&stem),
            regex::escape(&ext)
        ))
        .expect("escaped archive pattern is a valid regex");
        Self {
            path,
            size_limit_bytes,
            max_archives,
            archive_pattern,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one `<timestamp> [<LEVEL>] <message>` line, rotating first if the
    /// active file has reached the size ceiling.
    pub fn append(&mut self, message: &str, level: Level) -> io::Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.create_fresh(LOG_CREATED_MARKER)?
            }
            Err(e) => return Err(e),
        };

        if size >= self.size_limit_bytes {
            self.rotate()?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_line(level, message).as_bytes())
    }

    /// Archives the active file, starts a fresh one and prunes old archives.
    /// Returns the archive path.
    pub fn rotate(&mut self) -> io::Result<PathBuf> {
        let archive = self.next_archive_path();
        fs::rename(&self.path, &archive)?;

        let archive_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.create_fresh(&format!(
            "{LOG_CREATED_MARKER} (previous log archived as {archive_name})"
        ))?;

        self.prune_archives()?;
        Ok(archive)
    }

    /// Archive files next to the active log, oldest first by last-write time.
    pub fn archives(&self) -> io::Result<Vec<PathBuf>> {
        let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(self.directory())? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.archive_pattern.is_match(name) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            found.push((meta.modified()?, entry.path()));
        }
        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Deletes the oldest archives until at most `max_archives` remain.
    /// Returns the deleted paths.
    pub fn prune_archives(&self) -> io::Result<Vec<PathBuf>> {
        let archives = self.archives()?;
        let excess = archives.len().saturating_sub(self.max_archives);
        let mut deleted = Vec::with_capacity(excess);
        for path in archives.into_iter().take(excess) {
            fs::remove_file(&path)?;
            deleted.push(path);
        }
        Ok(deleted)
    }

    fn create_fresh(&self, marker: &str) -> io::Result<u64> {
        let line = format_line(Level::INFO, marker);
        fs::write(&self.path, line.as_bytes())?;
        Ok(line.len() as u64)
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn next_archive_path(&self) -> PathBuf {
        let (stem, ext) = split_name(&self.path);
        let stamp = Local::now().format(ARCHIVE_TIMESTAMP_FORMAT).to_string();
        let dir = self.directory();

        let mut candidate = dir.join(format!("{stem}_{stamp}{ext}"));
        let mut n = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{stem}_{stamp}_{n}{ext}"));
            n += 1;
        }
        candidate
    }
}

/// One log line, newline included.
pub fn format_line(level: Level, message: &str) -> String {
    format!(
        "{} [{}] {}\n",
        Local::now().format(LINE_TIMESTAMP_FORMAT),
        level,
        message
    )
}

/// File stem and extension (with its leading dot, or empty).
fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}
