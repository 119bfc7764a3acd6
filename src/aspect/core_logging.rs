use super::archive::RecordArchive;
use super::{Aspect, Flow};
use crate::source::LogRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Request and update lines carry a `path=` parameter.
static REQUEST_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\spath=\S+\s").expect("failed to compile request path regex"));

pub const CORE_LOGGING_FILE: &str = "core-logging.txt";

/// Copies everything that is not request traffic into `core-logging.txt`.
/// Does nothing without an output directory.
#[derive(Debug)]
pub struct CoreLoggingAspect {
    archive: Option<RecordArchive>,
    archived: AtomicU64,
}

impl CoreLoggingAspect {
    pub fn new(output_dir: Option<&Path>) -> io::Result<Self> {
        let archive = match output_dir {
            Some(dir) => Some(RecordArchive::create(
                &dir.join(CORE_LOGGING_FILE),
                "Core Logging (No updates or queries)\n-----------------\n\n",
            )?),
            None => None,
        };

        Ok(Self {
            archive,
            archived: AtomicU64::new(0),
        })
    }

    pub fn archived(&self) -> u64 {
        self.archived.load(Ordering::Relaxed)
    }
}

impl Aspect for CoreLoggingAspect {
    fn name(&self) -> &'static str {
        "core-logging"
    }

    fn process(&self, record: &LogRecord) -> Flow {
        let Some(archive) = &self.archive else {
            return Flow::Continue;
        };
        if REQUEST_REGEX.is_match(&record.headline) {
            return Flow::Continue;
        }

        self.archived.fetch_add(1, Ordering::Relaxed);
        archive.push(record, format!("{}\n{}", record.headline, record.body));
        Flow::Continue
    }

    fn end_of_file(&self) -> io::Result<()> {
        match &self.archive {
            Some(archive) => archive.flush_pending(),
            None => Ok(()),
        }
    }

    fn close(&self) -> io::Result<()> {
        match &self.archive {
            Some(archive) => archive.close(),
            None => Ok(()),
        }
    }

    fn print_report(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
