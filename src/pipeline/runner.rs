use crate::aspect::AspectPipeline;
use crate::config::MissingTimestampPolicy;
use crate::pipeline::instance::LogInstance;
use crate::source::{
    plan_chunks, unreached_ranges, ChunkScanner, ScanError, ScanOptions, TimestampMatcher,
};
use futures::future::join_all;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// Errors that can occur while processing log files
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: ScanError,
    },

    #[error("scanner task failed: {0}")]
    Join(#[from] JoinError),

    #[error("report output error: {0}")]
    Output(#[from] io::Error),
}

impl PipelineError {
    /// Whether the error stops the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Output(_))
    }
}

/// Scanner settings shared by every file of a run.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub matcher: Arc<TimestampMatcher>,
    pub threads: usize,
    pub scan: ScanOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub chunks: usize,
    pub records: u64,
    pub unparsed_timestamps: u64,
}

/// Result of running one instance to completion.
pub struct InstanceOutcome {
    pub instance: LogInstance,
    pub files: Vec<FileSummary>,
    pub failures: Vec<PipelineError>,
}

impl InstanceOutcome {
    pub fn bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn records(&self) -> u64 {
        self.files.iter().map(|f| f.records).sum()
    }
}

/// Scan one file with one blocking worker per chunk, all feeding `pipeline`.
///
/// Every worker is joined before the aspects' end-of-file hooks run, even when
/// one of them failed. A range with no headline only counts as missing its
/// timestamp when no earlier record's overrun reached across it.
pub async fn process_file(
    path: &Path,
    pipeline: &Arc<AspectPipeline>,
    settings: &RunnerSettings,
) -> Result<FileSummary, PipelineError> {
    let scan_error = |source: ScanError| PipelineError::Scan {
        path: path.to_path_buf(),
        source,
    };

    let bytes = tokio::fs::metadata(path)
        .await
        .map_err(|e| scan_error(ScanError::Io(e)))?
        .len();
    let ranges = plan_chunks(bytes, settings.threads);
    debug!(file = %path.display(), bytes, chunks = ranges.len(), "Planned chunks");

    let mut summary = FileSummary {
        path: path.to_path_buf(),
        bytes,
        chunks: ranges.len(),
        ..Default::default()
    };

    let workers = ranges.iter().map(|&range| {
        let scanner = ChunkScanner::new(
            path.to_path_buf(),
            bytes,
            range,
            Arc::clone(&settings.matcher),
            settings.scan,
        );
        let pipeline = Arc::clone(pipeline);
        tokio::task::spawn_blocking(move || {
            scanner.scan(|record| {
                pipeline.dispatch(&record);
            })
        })
    });
    let results = join_all(workers).await;

    pipeline.end_of_file()?;

    let mut first_error = None;
    let mut scanned = Vec::with_capacity(ranges.len());
    for (range, result) in ranges.iter().zip(results) {
        match result? {
            Ok(stats) => {
                summary.records += stats.records;
                summary.unparsed_timestamps += stats.unparsed_timestamps;
                scanned.push((*range, stats.pinned_pattern.is_some()));
            }
            Err(e) => {
                first_error.get_or_insert(e);
                scanned.push((*range, true));
            }
        }
    }

    let overrun = settings.scan.overrun;
    for range in unreached_ranges(&scanned, bytes, overrun) {
        let end = range.physical_end(bytes, overrun);
        match settings.scan.on_missing_timestamp {
            MissingTimestampPolicy::Warn => warn!(
                file = %path.display(),
                start = range.start,
                end,
                "No log entries found, could not match on timestamp"
            ),
            MissingTimestampPolicy::Error => {
                first_error.get_or_insert(ScanError::NoTimestamp {
                    start: range.start,
                    end,
                });
            }
        }
    }

    match first_error {
        Some(e) => Err(scan_error(e)),
        None => Ok(summary),
    }
}

/// Process an instance's files one after another, then close its aspects.
///
/// A file that cannot be scanned is recorded in the outcome and the remaining
/// files still run. Output errors abort the instance.
pub async fn process_instance(
    instance: LogInstance,
    settings: Arc<RunnerSettings>,
) -> Result<InstanceOutcome, PipelineError> {
    let mut files = Vec::with_capacity(instance.files.len());
    let mut failures = Vec::new();

    for path in &instance.files {
        info!(instance = %instance.key, file = %path.display(), "Processing file");

        match process_file(path, &instance.pipeline, &settings).await {
            Ok(summary) => files.push(summary),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to process file");
                failures.push(e);
            }
        }
    }

    instance.pipeline.close()?;

    Ok(InstanceOutcome {
        instance,
        files,
        failures,
    })
}

/// Run every instance concurrently. Outcomes are returned in input order.
pub async fn run_instances(
    instances: Vec<LogInstance>,
    settings: Arc<RunnerSettings>,
) -> Result<Vec<InstanceOutcome>, PipelineError> {
    let tasks = instances
        .into_iter()
        .map(|instance| tokio::spawn(process_instance(instance, Arc::clone(&settings))));

    let mut outcomes = Vec::new();
    let mut fatal = None;
    for joined in join_all(tasks).await {
        match joined? {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                fatal.get_or_insert(e);
            }
        }
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}
