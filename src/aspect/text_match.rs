use super::{lock, Aspect, Flow};
use crate::source::LogRecord;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextMatch {
    pub timestamp: Option<DateTime<Utc>>,
    pub source_file: String,
    pub offset: u64,
    pub text: String,
}

/// Turn a search term into a file name inside the instance directory.
///
/// The `match-` prefix keeps names like `.` or `query-report.txt` from
/// resolving to a directory or another report.
pub fn match_file_name(term: &str) -> String {
    let sanitized: String = term
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("match-{}.txt", sanitized)
}

/// Collects every record whose headline or body contains a literal term.
#[derive(Debug)]
pub struct TextMatchAspect {
    term: String,
    output: Option<PathBuf>,
    matches: Mutex<Vec<TextMatch>>,
}

impl TextMatchAspect {
    pub fn new(term: &str, output_dir: Option<&Path>) -> Self {
        Self {
            term: term.to_string(),
            output: output_dir.map(|dir| dir.join(match_file_name(term))),
            matches: Mutex::new(Vec::new()),
        }
    }

    /// Matches ordered by timestamp, unknown first, then by position.
    pub fn sorted_matches(&self) -> Vec<TextMatch> {
        let mut matches = lock(&self.matches).clone();
        matches.sort();
        matches
    }

    fn write_matches(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "TextMatch Report: {}", self.term)?;
        writeln!(out, "-----------------")?;
        for m in self.sorted_matches() {
            writeln!(out, "({})", m.source_file)?;
            writeln!(out, "  {}", m.text)?;
        }
        Ok(())
    }
}

impl Aspect for TextMatchAspect {
    fn name(&self) -> &'static str {
        "text-match"
    }

    fn process(&self, record: &LogRecord) -> Flow {
        if !record.headline.contains(&self.term) && !record.body.contains(&self.term) {
            return Flow::Continue;
        }

        let text = if record.body.is_empty() {
            record.headline.clone()
        } else {
            format!("{}:{}", record.headline, record.body)
        };
        lock(&self.matches).push(TextMatch {
            timestamp: record.parsed_timestamp,
            source_file: record.source_file.clone(),
            offset: record.offset,
            text,
        });
        Flow::Continue
    }

    fn close(&self) -> io::Result<()> {
        let Some(path) = &self.output else {
            return Ok(());
        };
        let mut buffer = Vec::new();
        self.write_matches(&mut buffer)?;
        fs::write(path, buffer)
    }

    fn summary_line(&self) -> String {
        format!(
            "TextMatch '{}': {} matches",
            self.term,
            lock(&self.matches).len()
        )
    }

    fn print_report(&self, out: &mut dyn Write) -> io::Result<()> {
        self.write_matches(out)?;
        writeln!(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
