use super::lock;
use crate::source::LogRecord;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
struct Pending {
    timestamp: Option<DateTime<Utc>>,
    source_file: String,
    offset: u64,
    text: String,
}

/// Output file that receives full record listings.
///
/// Entries are held until the current file's scanners have all finished and
/// are then written ordered by timestamp, file name and offset, so the file
/// contents do not depend on scheduling.
#[derive(Debug)]
pub struct RecordArchive {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    pending: Mutex<Vec<Pending>>,
}

impl RecordArchive {
    /// Create (truncating) `path` and write `header` to it.
    pub fn create(path: &Path, header: &str) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(header.as_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(Some(writer)),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, record: &LogRecord, text: String) {
        lock(&self.pending).push(Pending {
            timestamp: record.parsed_timestamp,
            source_file: record.source_file.clone(),
            offset: record.offset,
            text,
        });
    }

    /// Write everything pushed since the last flush.
    pub fn flush_pending(&self) -> io::Result<()> {
        let mut entries = std::mem::take(&mut *lock(&self.pending));
        if entries.is_empty() {
            return Ok(());
        }
        entries.sort_by(|a, b| {
            (a.timestamp, &a.source_file, a.offset).cmp(&(b.timestamp, &b.source_file, b.offset))
        });

        let mut guard = lock(&self.writer);
        let Some(writer) = guard.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is already closed", self.path.display()),
            ));
        };
        for entry in entries {
            writer.write_all(entry.text.as_bytes())?;
        }
        writer.flush()
    }

    /// Flush and release the file. Later calls are no-ops.
    pub fn close(&self) -> io::Result<()> {
        if lock(&self.writer).is_none() {
            return Ok(());
        }
        self.flush_pending()?;
        if let Some(mut writer) = lock(&self.writer).take() {
            writer.flush()?;
        }
        Ok(())
    }
}
