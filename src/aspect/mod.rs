//! Pluggable aggregators fed with every record of a log instance.
//!
//! Aspects are shared by all scanners of a file and are called concurrently,
//! so every implementation keeps its state behind atomics or mutexes. Reports
//! must not depend on the order records arrive in.

pub mod archive;
pub mod commit;
pub mod core_logging;
pub mod dedup;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod rate;
pub mod searcher;
pub mod text_match;
pub mod topk;

use crate::source::LogRecord;
use std::any::Any;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use commit::CommitAspect;
pub use core_logging::CoreLoggingAspect;
pub use error::ErrorAspect;
pub use pipeline::{AspectPipeline, TimeRange};
pub use query::QueryAspect;
pub use searcher::OpenSearcherAspect;
pub use text_match::TextMatchAspect;

/// Whether later aspects should still see a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub trait Aspect: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, record: &LogRecord) -> Flow;

    /// Called once every scanner of a file has finished.
    fn end_of_file(&self) -> io::Result<()> {
        Ok(())
    }

    /// Called once every file of the instance has been processed. Must be
    /// safe to call more than once.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }

    fn summary_line(&self) -> String {
        String::new()
    }

    fn print_report(&self, out: &mut dyn Write) -> io::Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Sizes and search terms used to build each instance's aspect list.
#[derive(Debug, Clone)]
pub struct AspectSettings {
    pub slow_queries: usize,
    pub slow_load_times: usize,
    pub text_terms: Vec<String>,
}

impl Default for AspectSettings {
    fn default() -> Self {
        Self {
            slow_queries: 10,
            slow_load_times: 5,
            text_terms: Vec::new(),
        }
    }
}

/// Build the standard aspect list for one instance. When `output_dir` is set,
/// aspects that keep full listings create their files inside it.
pub fn build_aspects(
    settings: &AspectSettings,
    output_dir: Option<&Path>,
) -> io::Result<Vec<Arc<dyn Aspect>>> {
    let mut aspects: Vec<Arc<dyn Aspect>> = vec![
        Arc::new(OpenSearcherAspect::new(settings.slow_load_times)),
        Arc::new(CommitAspect::new()),
        Arc::new(QueryAspect::new(output_dir, settings.slow_queries)?),
        Arc::new(ErrorAspect::new()),
        Arc::new(CoreLoggingAspect::new(output_dir)?),
    ];

    for term in &settings.text_terms {
        aspects.push(Arc::new(TextMatchAspect::new(term, output_dir)));
    }

    Ok(aspects)
}

/// Lock a mutex, recovering the data if a scanner thread panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record the earlier of two optional timestamps, preferring a known value.
pub(crate) fn earliest<T: Ord>(current: Option<T>, candidate: Option<T>) -> Option<T> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
