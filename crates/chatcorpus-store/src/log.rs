use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chatcorpus_schema::MessageRecord;
use fs2::FileExt;
use tracing::warn;

/// Append-only writer for the chat log (one JSON record per line).
#[derive(Debug, Clone)]
pub struct MessageLogWriter {
    path: PathBuf,
}

impl MessageLogWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single record. The line is written with one `write_all` while
    /// holding an exclusive lock on the log.
    pub async fn append(&self, record: &MessageRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_line(&path, line.as_bytes()))
            .await
            .map_err(std::io::Error::other)?
    }
}

fn append_line(path: &Path, line: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    FileExt::lock_exclusive(&file)?;
    let written = file.write_all(line);
    FileExt::unlock(&file)?;
    written
}

/// Parsed view of the chat log at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSnapshot {
    /// Records in log order.
    pub records: Vec<MessageRecord>,
    /// Non-blank lines that could not be used.
    pub skipped_lines: usize,
}

/// Reader for the chat log
#[derive(Debug, Clone)]
pub struct MessageLogReader {
    path: PathBuf,
}

impl MessageLogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }

    /// Read the whole log once under a shared lock and parse it.
    ///
    /// Returns `Ok(None)` when the log has never been written.
    pub async fn snapshot(&self) -> std::io::Result<Option<LogSnapshot>> {
        let path = self.path.clone();
        let content = tokio::task::spawn_blocking(move || read_locked(&path))
            .await
            .map_err(std::io::Error::other)??;

        Ok(content.map(|content| parse_log(&content)))
    }
}

fn read_locked(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error),
    };

    FileExt::lock_shared(&file)?;
    let mut bytes = Vec::new();
    let read = file.read_to_end(&mut bytes);
    FileExt::unlock(&file)?;
    read?;

    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Parse log content line by line. Malformed lines and records with blank
/// content are dropped and counted; they never fail the parse.
pub fn parse_log(content: &str) -> LogSnapshot {
    let mut snapshot = LogSnapshot::default();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<MessageRecord>(line) {
            Ok(record) if record.content.trim().is_empty() => {
                snapshot.skipped_lines += 1;
                warn!(line = index + 1, "skipping chat log record with blank content");
            }
            Ok(record) => snapshot.records.push(record),
            Err(error) => {
                snapshot.skipped_lines += 1;
                warn!(line = index + 1, %error, "failed to parse chat log line");
            }
        }
    }

    snapshot
}
