use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::session::{Mode, TransferOutcome};

/// One finished session, as written to the journal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub timestamp: String,
    pub session_id: String,
    pub peer: String,
    pub mode: Option<String>,
    pub filename: Option<String>,
    pub status: String,
    pub bytes_transferred: u64,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// Everything a finished session reports to the journal.
pub struct SessionRecord<'a> {
    pub session_id: &'a str,
    pub peer: &'a str,
    pub mode: Option<Mode>,
    pub filename: Option<&'a str>,
    pub outcome: &'a TransferOutcome,
    pub elapsed_ms: u64,
    pub error: Option<&'a str>,
}

pub trait Logger: Send + Sync {
    fn session_done(&self, _record: &SessionRecord<'_>) {}
    fn foreign(&self, _session_id: &str, _peer: &str, _line: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Appends one JSON object per line.
pub struct JsonlLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open journal {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(f),
        })
    }

    fn append(&self, entry: &JournalEntry) {
        let mut line = match serde_json::to_vec(entry) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!("journal entry not serializable: {}", e);
                return;
            }
        };
        line.push(b'\n');
        let mut f = self.file.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("journal lock for {} was poisoned; continuing", self.path.display());
            poisoned.into_inner()
        });
        if let Err(e) = f.write_all(&line) {
            tracing::warn!("journal write to {} failed: {}", self.path.display(), e);
        }
    }

    pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).context("Failed to open journal for reading")?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

impl Logger for JsonlLogger {
    fn session_done(&self, r: &SessionRecord<'_>) {
        self.append(&JournalEntry {
            timestamp: Utc::now().to_rfc3339(),
            session_id: r.session_id.to_string(),
            peer: r.peer.to_string(),
            mode: r.mode.map(|m| format!("{:?}", m)),
            filename: r.filename.map(str::to_string),
            status: format!("{:?}", r.outcome.status),
            bytes_transferred: r.outcome.bytes_transferred,
            elapsed_ms: r.elapsed_ms,
            error: r.error.map(str::to_string),
        });
    }

    fn foreign(&self, session_id: &str, peer: &str, line: &str) {
        self.append(&JournalEntry {
            timestamp: Utc::now().to_rfc3339(),
            session_id: session_id.to_string(),
            peer: peer.to_string(),
            mode: None,
            filename: None,
            status: format!("Foreign({line})"),
            bytes_transferred: 0,
            elapsed_ms: 0,
            error: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TransferStatus;

    #[test]
    fn journal_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs/journal.jsonl");
        let logger = JsonlLogger::new(&path).unwrap();

        let ok = TransferOutcome::ok(42);
        logger.session_done(&SessionRecord {
            session_id: "s1",
            peer: "127.0.0.1:9",
            mode: Some(Mode::Download),
            filename: Some("a.txt"),
            outcome: &ok,
            elapsed_ms: 5,
            error: None,
        });
        let failed = TransferOutcome {
            status: TransferStatus::IoFailure,
            bytes_transferred: 7,
        };
        logger.session_done(&SessionRecord {
            session_id: "s2",
            peer: "127.0.0.1:10",
            mode: Some(Mode::Upload),
            filename: Some("b.txt"),
            outcome: &failed,
            elapsed_ms: 1,
            error: Some("transport: broken pipe"),
        });

        let entries = JsonlLogger::read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, "Ok");
        assert_eq!(entries[0].bytes_transferred, 42);
        assert_eq!(entries[0].mode.as_deref(), Some("Download"));
        assert_eq!(entries[1].status, "IoFailure");
        assert_eq!(entries[1].error.as_deref(), Some("transport: broken pipe"));
    }

    #[test]
    fn poisoned_lock_still_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("journal.jsonl");
        let logger = std::sync::Arc::new(JsonlLogger::new(&path).unwrap());

        let held = logger.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.file.lock().unwrap();
            panic!("writer died holding the journal lock");
        })
        .join();
        assert!(logger.file.is_poisoned());

        logger.foreign("s3", "127.0.0.1:11", "GET / HTTP/1.0");
        let entries = JsonlLogger::read_entries(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, "s3");
    }

    #[test]
    fn missing_journal_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(JsonlLogger::read_entries(&tmp.path().join("none")).unwrap().is_empty());
    }
}
