use super::{Aspect, Flow};
use crate::source::LogRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

static OPTIMIZE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"optimize=(true|false)").expect("failed to compile optimize regex"));
static SOFT_COMMIT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"softCommit=(true|false)").expect("failed to compile softCommit regex")
});
static OPEN_SEARCHER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"openSearcher=(true|false)").expect("failed to compile openSearcher regex")
});

const COMMIT_MARKER: &str = "start commit{";

/// Counts commit events and their flags.
#[derive(Debug, Default)]
pub struct CommitAspect {
    commits: AtomicU64,
    optimizes: AtomicU64,
    soft_commits: AtomicU64,
    open_searchers: AtomicU64,
}

fn flag_set(regex: &Regex, line: &str) -> bool {
    regex
        .captures(line)
        .is_some_and(|caps| &caps[1] == "true")
}

impl CommitAspect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn optimizes(&self) -> u64 {
        self.optimizes.load(Ordering::Relaxed)
    }

    pub fn soft_commits(&self) -> u64 {
        self.soft_commits.load(Ordering::Relaxed)
    }

    pub fn hard_commits(&self) -> u64 {
        self.commits().saturating_sub(self.soft_commits())
    }

    pub fn open_searchers(&self) -> u64 {
        self.open_searchers.load(Ordering::Relaxed)
    }
}

impl Aspect for CommitAspect {
    fn name(&self) -> &'static str {
        "commit"
    }

    fn process(&self, record: &LogRecord) -> Flow {
        let line = &record.headline;
        if !line.contains(COMMIT_MARKER) {
            return Flow::Continue;
        }

        self.commits.fetch_add(1, Ordering::Relaxed);
        if flag_set(&OPTIMIZE_REGEX, line) {
            self.optimizes.fetch_add(1, Ordering::Relaxed);
        }
        if flag_set(&SOFT_COMMIT_REGEX, line) {
            self.soft_commits.fetch_add(1, Ordering::Relaxed);
        }
        if flag_set(&OPEN_SEARCHER_REGEX, line) {
            self.open_searchers.fetch_add(1, Ordering::Relaxed);
        }
        Flow::Continue
    }

    fn summary_line(&self) -> String {
        format!(
            "Commits: {} (soft: {}, hard: {})",
            self.commits(),
            self.soft_commits(),
            self.hard_commits()
        )
    }

    fn print_report(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Commit Report")?;
        writeln!(out, "-----------------")?;
        writeln!(out, "Commits Found: {}", self.commits())?;
        writeln!(out, "Contained Optimize: {}", self.optimizes())?;
        writeln!(out, "Hard Commits: {}", self.hard_commits())?;
        writeln!(out, "Soft Commits: {}", self.soft_commits())?;
        writeln!(out, "With openSearcher: {}", self.open_searchers())?;
        writeln!(
            out,
            "Without openSearcher: {}",
            self.commits().saturating_sub(self.open_searchers())
        )?;
        writeln!(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
