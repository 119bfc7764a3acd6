use crate::aspect::{AspectSettings, TimeRange};
use crate::config::{load_config, Config, ConfigError};
use crate::pipeline::{
    group_instances, run_instances, InstanceOutcome, LogInstance, PipelineError, RunnerSettings,
};
use crate::source::discovery::{discover_files, DiscoveryError};
use crate::source::{ScanOptions, TimestampError, TimestampMatcher};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

pub const SUMMARY_FILE: &str = "summary.txt";
pub const INSTANCE_REPORT_FILE: &str = "logs-report.txt";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("timestamp pattern error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("failed to discover log files under {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: DiscoveryError,
    },

    #[error("no log files found at {0}")]
    NoFiles(PathBuf),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("report output error: {0}")]
    Report(#[from] io::Error),

    #[error("{0} file(s) could not be processed")]
    FilesFailed(usize),
}

/// Command-line choices for one analysis run. `None` fields fall back to the
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub path: PathBuf,
    pub terms: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub range: Option<(String, String)>,
    pub slow_queries: Option<usize>,
    pub slow_load_times: Option<usize>,
    pub threads: Option<usize>,
}

/// Everything a finished run produced.
pub struct Analysis {
    pub outcomes: Vec<InstanceOutcome>,
    pub elapsed: Duration,
}

impl Analysis {
    pub fn bytes(&self) -> u64 {
        self.outcomes.iter().map(|o| o.bytes()).sum()
    }

    pub fn records(&self) -> u64 {
        self.outcomes.iter().map(|o| o.records()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.failures.len()).sum()
    }

    pub fn instance(&self, key: &str) -> Option<&InstanceOutcome> {
        self.outcomes.iter().find(|o| o.instance.key == key)
    }
}

pub async fn run(
    options: RunOptions,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path).map_err(RunError::from)?
        }
        None => {
            info!("No config file found, using built-in defaults");
            Config::default()
        }
    };

    let analysis = analyze(&options, &config).await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_reports(&analysis, &mut out, options.output_dir.as_deref()).map_err(RunError::from)?;

    let failed = analysis.failure_count();
    if failed > 0 {
        for outcome in &analysis.outcomes {
            for failure in &outcome.failures {
                error!(
                    instance = %outcome.instance.key,
                    error = %failure,
                    "File was not processed"
                );
            }
        }
        return Err(RunError::FilesFailed(failed).into());
    }

    Ok(())
}

fn parse_range(range: &Option<(String, String)>) -> Result<Option<TimeRange>, RunError> {
    let Some((start, end)) = range else {
        return Ok(None);
    };
    let parsed = TimeRange::parse(start, end).map_err(|e| {
        RunError::InvalidArgs(format!(
            "range '{}' to '{}' must use YYYY-MM-DD HH:MM:SS: {}",
            start, end, e
        ))
    })?;
    if parsed.start > parsed.end {
        return Err(RunError::InvalidArgs(format!(
            "range start '{}' is after end '{}'",
            start, end
        )));
    }
    Ok(Some(parsed))
}

/// Discover, group and scan every file named by `options`.
pub async fn analyze(options: &RunOptions, config: &Config) -> Result<Analysis, RunError> {
    let started = Instant::now();

    if !options.terms.is_empty() && options.output_dir.is_none() {
        return Err(RunError::InvalidArgs(
            "search terms require an output directory (-o)".to_string(),
        ));
    }
    let range = parse_range(&options.range)?;
    let matcher = Arc::new(TimestampMatcher::from_config(&config.timestamps)?);

    let files = discover_files(&options.path).map_err(|source| RunError::Discovery {
        path: options.path.clone(),
        source,
    })?;
    if files.is_empty() {
        return Err(RunError::NoFiles(options.path.clone()));
    }
    info!(path = %options.path.display(), files = files.len(), "Discovered log files");

    if let Some(dir) = &options.output_dir {
        fs::create_dir_all(dir)?;
    }

    let aspects = AspectSettings {
        slow_queries: options.slow_queries.unwrap_or(config.report.slow_queries),
        slow_load_times: options
            .slow_load_times
            .unwrap_or(config.report.slow_load_times),
        text_terms: options.terms.clone(),
    };
    let instances = group_instances(&files)
        .into_iter()
        .map(|group| LogInstance::create(group, &aspects, options.output_dir.as_deref(), range))
        .collect::<io::Result<Vec<_>>>()?;

    let mut scan = config.scan.clone();
    if let Some(threads) = options.threads {
        scan.threads = threads;
    }
    let settings = RunnerSettings {
        matcher,
        threads: scan.effective_threads(),
        scan: ScanOptions {
            overrun: scan.overrun_bytes,
            on_missing_timestamp: scan.on_missing_timestamp,
        },
    };
    info!(
        instances = instances.len(),
        threads = settings.threads,
        "Starting analysis"
    );

    let outcomes = run_instances(instances, Arc::new(settings)).await?;
    let analysis = Analysis {
        outcomes,
        elapsed: started.elapsed(),
    };

    info!(
        minutes = %format!("{:.2}", analysis.elapsed.as_secs_f64() / 60.0),
        megabytes = %format!("{:.2}", analysis.bytes() as f64 / (1024.0 * 1024.0)),
        records = analysis.records(),
        "Analysis complete"
    );
    Ok(analysis)
}

/// Cross-instance summary: one block per instance with its aspects'
/// summary lines.
pub fn render_summary(analysis: &Analysis) -> String {
    let mut summary = String::from("- Summary Report -\n\n");

    for outcome in &analysis.outcomes {
        summary.push_str(&format!("Instance: {}\n", outcome.instance.key));
        summary.push_str(&format!(
            "  Files: {}  Records: {}\n",
            outcome.files.len(),
            outcome.records()
        ));
        for line in outcome.instance.pipeline.summary_lines() {
            summary.push_str(&format!("  {}\n", line));
        }
        for failure in &outcome.failures {
            summary.push_str(&format!("  Failed: {}\n", failure));
        }
        summary.push('\n');
    }
    summary
}

/// Full per-instance report: summary lines followed by every aspect's report.
pub fn render_instance_report(outcome: &InstanceOutcome) -> io::Result<Vec<u8>> {
    let mut report = Vec::new();
    let instance = &outcome.instance;

    writeln!(report, "* Instance Report: {}", instance.key)?;
    for file in &outcome.files {
        writeln!(report, "  {} ({} records)", file.path.display(), file.records)?;
    }
    for line in instance.pipeline.summary_lines() {
        writeln!(report, "  {}", line)?;
    }
    writeln!(report)?;
    instance.pipeline.print_report(&mut report)?;
    Ok(report)
}

/// Print the summary, then each instance report. With an output directory
/// the summary is also saved there and instance reports go to each
/// instance's own directory.
pub fn write_reports(
    analysis: &Analysis,
    out: &mut dyn Write,
    output_dir: Option<&Path>,
) -> io::Result<()> {
    let summary = render_summary(analysis);
    out.write_all(summary.as_bytes())?;
    if let Some(dir) = output_dir {
        fs::write(dir.join(SUMMARY_FILE), &summary)?;
    }

    for outcome in &analysis.outcomes {
        let report = render_instance_report(outcome)?;
        match &outcome.instance.output_dir {
            Some(dir) => {
                let path = dir.join(INSTANCE_REPORT_FILE);
                fs::write(&path, &report)?;
                writeln!(out, "Report for {} written to {}", outcome.instance.key, path.display())?;
            }
            None => out.write_all(&report)?,
        }
    }
    out.flush()
}
