use super::dedup::{DedupSet, Occurrence};
use super::{lock, Aspect, Flow};
use crate::source::LogRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Splits a headline into its prefix (timestamp through level) and message.
static LEVEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?s)(.*?\s(?:ERROR|WARN|INFO|DEBUG|TRACE))(.*)$")
        .expect("failed to compile level regex")
});

const UNKNOWN_PREFIX: &str = "[UNKNOWN TS]";
const OOM_MARKER: &str = "OutOfMemoryError";

pub fn is_error(record: &LogRecord) -> bool {
    record.headline.contains("Exception") || record.headline.contains(" ERROR ")
}

/// Groups error records by message and stack trace, ignoring the timestamp
/// and thread prefix.
#[derive(Debug, Default)]
pub struct ErrorAspect {
    errors: Mutex<DedupSet>,
    ooms: AtomicU64,
    saw_unknown_timestamp: AtomicBool,
}

impl ErrorAspect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique_errors(&self) -> usize {
        lock(&self.errors).len()
    }

    pub fn total_errors(&self) -> usize {
        lock(&self.errors).occurrence_count()
    }

    pub fn ooms(&self) -> u64 {
        self.ooms.load(Ordering::Relaxed)
    }

    pub fn saw_unknown_timestamp(&self) -> bool {
        self.saw_unknown_timestamp.load(Ordering::Relaxed)
    }

    /// Raw timestamp of the earliest occurrence that has a parsed time.
    pub fn first_error(&self) -> Option<String> {
        let errors = lock(&self.errors);
        let first = errors
            .sorted_entries()
            .into_iter()
            .flat_map(|e| e.sorted_occurrences())
            .filter(|o| o.timestamp.is_some())
            .min()
            .map(|o| o.raw_timestamp.clone());
        first
    }
}

impl Aspect for ErrorAspect {
    fn name(&self) -> &'static str {
        "error"
    }

    fn process(&self, record: &LogRecord) -> Flow {
        if record.headline.contains(OOM_MARKER) || record.body.contains(OOM_MARKER) {
            self.ooms.fetch_add(1, Ordering::Relaxed);
        }
        if !is_error(record) {
            return Flow::Continue;
        }

        let (prefix, text) = match LEVEL_REGEX.captures(&record.headline) {
            Some(caps) => (
                caps[1].to_string(),
                format!("{}\n{}", &caps[2], record.body),
            ),
            None => {
                self.saw_unknown_timestamp.store(true, Ordering::Relaxed);
                (
                    UNKNOWN_PREFIX.to_string(),
                    format!("{}\n{}", record.headline, record.body),
                )
            }
        };
        if record.parsed_timestamp.is_none() {
            self.saw_unknown_timestamp.store(true, Ordering::Relaxed);
        }

        let occurrence = Occurrence {
            timestamp: record.parsed_timestamp,
            raw_timestamp: record.raw_timestamp.clone(),
            label: format!("{} : {}", prefix, record.source_file),
        };
        lock(&self.errors).insert(text, occurrence);
        Flow::Continue
    }

    fn summary_line(&self) -> String {
        let mut line = format!("Errors: {}", self.unique_errors());
        if let Some(first) = self.first_error() {
            line.push_str(&format!(" First Error: {}", first));
        }
        line
    }

    fn print_report(&self, out: &mut dyn Write) -> io::Result<()> {
        let errors = lock(&self.errors);

        writeln!(out, "Errors Report")?;
        writeln!(out, "-----------------")?;
        writeln!(out, "Errors found: {}", errors.occurrence_count())?;
        writeln!(out, "Unique errors: {}", errors.len())?;
        let ooms = self.ooms();
        if ooms > 0 {
            writeln!(out, "OutOfMemoryErrors: {}", ooms)?;
        }
        if self.saw_unknown_timestamp() {
            writeln!(out, "Some errors had no recognizable timestamp")?;
        }
        writeln!(out)?;

        for entry in errors.sorted_entries() {
            for occurrence in entry.sorted_occurrences() {
                writeln!(out, "({})", occurrence.label)?;
            }
            writeln!(out, "{}", entry.text)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
