use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Ordered timestamp patterns; the first one to match a line is pinned
    /// for the remainder of that chunk.
    #[serde(default = "default_timestamps")]
    pub timestamps: Vec<TimestampConfig>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timestamps: default_timestamps(),
            scan: ScanConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampConfig {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl TimestampConfig {
    pub fn new(pattern: &str, format: Option<&str>) -> Self {
        Self {
            pattern: pattern.to_string(),
            format: format.map(str::to_string),
        }
    }
}

pub(crate) fn default_timestamps() -> Vec<TimestampConfig> {
    vec![
        TimestampConfig::new(
            r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}) .*",
            Some("%Y-%m-%d %H:%M:%S%.3f"),
        ),
        TimestampConfig::new(
            r"[A-Z]+\s+- (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3});.*",
            Some("%Y-%m-%d %H:%M:%S%.3f"),
        ),
        TimestampConfig::new(
            r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})) .*",
            Some("iso8601"),
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Worker threads per file; 0 uses the available parallelism.
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_overrun_bytes")]
    pub overrun_bytes: u64,
    #[serde(default)]
    pub on_missing_timestamp: MissingTimestampPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            overrun_bytes: default_overrun_bytes(),
            on_missing_timestamp: MissingTimestampPolicy::Warn,
        }
    }
}

impl ScanConfig {
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            crate::source::chunk::default_parallelism()
        } else {
            self.threads
        }
    }
}

fn default_overrun_bytes() -> u64 {
    crate::source::chunk::DEFAULT_OVERRUN
}

/// What a scanner does when no line in its range matches any timestamp pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTimestampPolicy {
    /// Log a warning; the chunk contributes no records.
    #[default]
    Warn,
    /// Fail the file.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_slow_queries")]
    pub slow_queries: usize,
    #[serde(default = "default_slow_load_times")]
    pub slow_load_times: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            slow_queries: default_slow_queries(),
            slow_load_times: default_slow_load_times(),
        }
    }
}

fn default_slow_queries() -> usize {
    10
}

fn default_slow_load_times() -> usize {
    5
}
