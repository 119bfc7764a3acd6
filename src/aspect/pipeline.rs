use super::{Aspect, Flow};
use crate::source::LogRecord;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::error;

/// Inclusive time window used to restrict which records reach the aspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub const RANGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Parse two `YYYY-MM-DD HH:MM:SS` bounds, read as UTC.
    pub fn parse(start: &str, end: &str) -> Result<Self, chrono::ParseError> {
        let parse = |value: &str| {
            NaiveDateTime::parse_from_str(value.trim(), RANGE_FORMAT)
                .map(|naive| Utc.from_utc_datetime(&naive))
        };
        Ok(Self::new(parse(start)?, parse(end)?))
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Ordered list of aspects that every record of an instance flows through.
pub struct AspectPipeline {
    aspects: Vec<Arc<dyn Aspect>>,
    range: Option<TimeRange>,
}

impl AspectPipeline {
    pub fn new(aspects: Vec<Arc<dyn Aspect>>) -> Self {
        Self {
            aspects,
            range: None,
        }
    }

    /// Only dispatch records whose parsed timestamp falls in `range`. Records
    /// without a parsed timestamp are dropped while a range is set.
    pub fn with_range(mut self, range: Option<TimeRange>) -> Self {
        self.range = range;
        self
    }

    pub fn aspects(&self) -> &[Arc<dyn Aspect>] {
        &self.aspects
    }

    /// Feed `record` to each aspect in order until one returns [`Flow::Stop`].
    /// Returns false when the time range filtered the record out.
    pub fn dispatch(&self, record: &LogRecord) -> bool {
        if let Some(range) = &self.range {
            match record.parsed_timestamp {
                Some(ts) if range.contains(ts) => {}
                _ => return false,
            }
        }

        for aspect in &self.aspects {
            if aspect.process(record) == Flow::Stop {
                break;
            }
        }
        true
    }

    /// Run every aspect's end-of-file hook, returning the first failure.
    pub fn end_of_file(&self) -> io::Result<()> {
        self.for_each("end of file", |aspect| aspect.end_of_file())
    }

    pub fn close(&self) -> io::Result<()> {
        self.for_each("close", |aspect| aspect.close())
    }

    /// Run `step` on every aspect, returning the first failure.
    fn for_each<F>(&self, stage: &str, step: F) -> io::Result<()>
    where
        F: Fn(&dyn Aspect) -> io::Result<()>,
    {
        let mut result = Ok(());
        for aspect in &self.aspects {
            if let Err(e) = step(aspect.as_ref()) {
                error!(aspect = aspect.name(), stage, error = %e, "Aspect failed");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Non-empty summary lines in aspect order.
    pub fn summary_lines(&self) -> Vec<String> {
        self.aspects
            .iter()
            .map(|a| a.summary_line())
            .filter(|line| !line.is_empty())
            .collect()
    }

    pub fn print_report(&self, out: &mut dyn Write) -> io::Result<()> {
        for aspect in &self.aspects {
            aspect.print_report(out)?;
        }
        Ok(())
    }

    /// First aspect of concrete type `T`.
    pub fn find<T: Aspect + 'static>(&self) -> Option<&T> {
        self.aspects
            .iter()
            .find_map(|a| a.as_any().downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::testing::{record, ts};
    use std::any::Any;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u64>>,
        stop: bool,
        fail_close: bool,
        closed: Mutex<bool>,
    }

    impl Aspect for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn process(&self, record: &LogRecord) -> Flow {
            self.seen.lock().unwrap().push(record.offset);
            if self.stop {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }

        fn close(&self) -> io::Result<()> {
            *self.closed.lock().unwrap() = true;
            if self.fail_close {
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            } else {
                Ok(())
            }
        }

        fn summary_line(&self) -> String {
            format!("seen {}", self.seen.lock().unwrap().len())
        }

        fn print_report(&self, out: &mut dyn Write) -> io::Result<()> {
            writeln!(out, "recorder")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn seen(pipeline: &AspectPipeline, index: usize) -> Vec<u64> {
        pipeline.aspects()[index]
            .as_any()
            .downcast_ref::<Recorder>()
            .unwrap()
            .seen
            .lock()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_stop_short_circuits_later_aspects() {
        let pipeline = AspectPipeline::new(vec![
            Arc::new(Recorder::default()),
            Arc::new(Recorder {
                stop: true,
                ..Default::default()
            }),
            Arc::new(Recorder::default()),
        ]);

        pipeline.dispatch(&record("solr.log", 7, "2024-01-01 00:00:00.000 INFO x", ""));

        assert_eq!(seen(&pipeline, 0), vec![7]);
        assert_eq!(seen(&pipeline, 1), vec![7]);
        assert!(seen(&pipeline, 2).is_empty());
    }

    #[test]
    fn test_range_filter_is_inclusive_and_drops_unparsed() {
        let range = TimeRange::parse("2024-01-01 00:00:00", "2024-01-01 00:00:10").unwrap();
        let pipeline =
            AspectPipeline::new(vec![Arc::new(Recorder::default())]).with_range(Some(range));

        assert!(pipeline.dispatch(&record("f", 1, "2024-01-01 00:00:00.000 INFO a", "")));
        assert!(pipeline.dispatch(&record("f", 2, "2024-01-01 00:00:10.000 INFO b", "")));
        assert!(!pipeline.dispatch(&record("f", 3, "2024-01-01 00:00:10.001 INFO c", "")));
        assert!(!pipeline.dispatch(&record("f", 4, "no timestamp here", "")));

        assert_eq!(seen(&pipeline, 0), vec![1, 2]);
    }

    #[test]
    fn test_summary_and_find() {
        let pipeline = AspectPipeline::new(vec![Arc::new(Recorder::default())]);
        pipeline.dispatch(&record("f", 1, "2024-01-01 00:00:00.000 INFO a", ""));

        assert_eq!(pipeline.summary_lines(), vec!["seen 1".to_string()]);
        assert!(pipeline.find::<Recorder>().is_some());

        let mut out = Vec::new();
        pipeline.print_report(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "recorder\n");
    }

    #[test]
    fn test_range_parse_rejects_bad_input() {
        assert!(TimeRange::parse("yesterday", "2024-01-01 00:00:00").is_err());
        let range = TimeRange::parse("2024-01-01 00:00:00", "2024-01-02 00:00:00").unwrap();
        assert!(range.contains(ts("2024-01-01 12:00:00.000")));
    }

    #[test]
    fn test_close_reaches_every_aspect_and_returns_first_failure() {
        let pipeline = AspectPipeline::new(vec![
            Arc::new(Recorder {
                fail_close: true,
                ..Default::default()
            }),
            Arc::new(Recorder::default()),
        ]);

        let err = pipeline.close().unwrap_err();
        assert_eq!(err.to_string(), "disk full");

        let second = pipeline.aspects()[1]
            .as_any()
            .downcast_ref::<Recorder>()
            .unwrap();
        assert!(*second.closed.lock().unwrap());
    }
}
