use super::archive::RecordArchive;
use super::rate::{format_rate, RateEstimator};
use super::topk::TopK;
use super::{lock, Aspect, Flow};
use crate::source::LogRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

static QUERY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?s).*?[&{]q=(.*?)(?:&|\}).*?hits=(\d+).*?QTime=(\d+).*$")
        .expect("failed to compile query regex")
});

pub const QUERY_REPORT_FILE: &str = "query-report.txt";

/// A request line with its parameters pulled out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Query {
    pub raw_timestamp: String,
    pub query: String,
    pub hits: u64,
    pub qtime: u64,
    pub headline: String,
}

impl Query {
    pub fn parse(record: &LogRecord) -> Option<Self> {
        let caps = QUERY_REGEX.captures(&record.headline)?;
        Some(Self {
            raw_timestamp: record.raw_timestamp.clone(),
            query: caps[1].to_string(),
            hits: caps[2].parse().ok()?,
            qtime: caps[3].parse().ok()?,
            headline: record.headline.clone(),
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query: {}", self.query)?;
        writeln!(
            f,
            "Info: [timestamp={}, qtime={}, results={}]",
            self.raw_timestamp, self.qtime, self.hits
        )?;
        writeln!(f, "Log: {}", self.headline)
    }
}

#[derive(Debug)]
struct QueryState {
    slowest: TopK<u64, Query>,
    rate: RateEstimator,
}

/// Collects the slowest queries and the query rate. With an output directory
/// every query is also listed in `query-report.txt`.
#[derive(Debug)]
pub struct QueryAspect {
    state: Mutex<QueryState>,
    archive: Option<RecordArchive>,
}

impl QueryAspect {
    pub fn new(output_dir: Option<&Path>, slowest: usize) -> io::Result<Self> {
        let archive = match output_dir {
            Some(dir) => Some(RecordArchive::create(
                &dir.join(QUERY_REPORT_FILE),
                "Query Report\n-----------------\n\n",
            )?),
            None => None,
        };

        Ok(Self {
            state: Mutex::new(QueryState {
                slowest: TopK::new(slowest),
                rate: RateEstimator::new(),
            }),
            archive,
        })
    }

    pub fn query_count(&self) -> u64 {
        lock(&self.state).rate.count()
    }

    pub fn queries_per_second(&self) -> Option<f64> {
        lock(&self.state).rate.rate()
    }

    /// Slowest queries, largest QTime first.
    pub fn slowest(&self) -> Vec<Query> {
        lock(&self.state)
            .slowest
            .sorted_desc()
            .into_iter()
            .map(|item| item.value.clone())
            .collect()
    }
}

impl Aspect for QueryAspect {
    fn name(&self) -> &'static str {
        "query"
    }

    fn process(&self, record: &LogRecord) -> Flow {
        let Some(query) = Query::parse(record) else {
            return Flow::Continue;
        };

        if let Some(archive) = &self.archive {
            archive.push(record, format!("{}\n", query));
        }

        let mut state = lock(&self.state);
        state.rate.observe(record.parsed_timestamp);
        state.slowest.push(query.qtime, query);
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

    fn summary_line(&self) -> String {
        format!("QPS: {}", format_rate(self.queries_per_second()))
    }

    fn print_report(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Query Report")?;
        writeln!(out, "-----------------")?;
        writeln!(out)?;
        writeln!(out, "Queries found: {}", self.query_count())?;
        writeln!(out, "Approx QPS: {}", format_rate(self.queries_per_second()))?;
        writeln!(out)?;

        let slowest = self.slowest();
        if !slowest.is_empty() {
            writeln!(out, "{} slowest queries:", slowest.len())?;
            writeln!(out)?;
            for query in slowest {
                writeln!(out, "{}", query)?;
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
