use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use thiserror::Error;

use crate::config::types::TimestampConfig;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("regex compilation failed for pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no timestamp patterns configured")]
    NoPatterns,

    #[error("failed to parse timestamp '{value}' with format '{format}': {source}")]
    ParseError {
        value: String,
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampFormat {
    Strptime(String),
    Iso8601,
    Epoch,
    EpochMs,
}

impl TimestampFormat {
    pub fn from_config(format: &str) -> Self {
        match format {
            "iso8601" => TimestampFormat::Iso8601,
            "epoch" => TimestampFormat::Epoch,
            "epoch_ms" => TimestampFormat::EpochMs,
            other => TimestampFormat::Strptime(other.to_string()),
        }
    }
}

/// One configured line shape: a whole-line regex plus the date format used to
/// interpret the timestamp it captures.
#[derive(Debug)]
pub struct TimestampPattern {
    regex: Regex,
    format: Option<TimestampFormat>,
}

impl TimestampPattern {
    /// Compile a pattern. The regex must match the entire line; the timestamp
    /// is taken from the `ts` named group, else group 1, else the whole match.
    pub fn new(pattern: &str, format: Option<&str>) -> Result<Self, TimestampError> {
        let anchored = format!("^(?s:{})$", pattern);
        let regex = Regex::new(&anchored).map_err(|source| TimestampError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            regex,
            format: format.map(TimestampFormat::from_config),
        })
    }

    /// Returns the raw timestamp text if the line has this shape.
    pub fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        let captures = self.regex.captures(line)?;
        let ts = captures
            .name("ts")
            .or_else(|| captures.get(1))
            .or_else(|| captures.get(0))?;
        Some(ts.as_str())
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Parse a raw timestamp with this pattern's date format.
    ///
    /// Returns `Ok(None)` when no date format is configured.
    pub fn parse(&self, value: &str) -> Result<Option<DateTime<Utc>>, TimestampError> {
        let Some(format) = &self.format else {
            return Ok(None);
        };

        let datetime = match format {
            TimestampFormat::Iso8601 => parse_iso8601(value)?,
            TimestampFormat::Epoch => parse_epoch(value)?,
            TimestampFormat::EpochMs => parse_epoch_ms(value)?,
            TimestampFormat::Strptime(fmt) => parse_strptime(value, fmt)?,
        };

        Ok(Some(datetime))
    }
}

/// Ordered set of timestamp patterns. The first pattern that matches a line
/// wins; scanners pin that pattern for the rest of their chunk.
#[derive(Debug)]
pub struct TimestampMatcher {
    patterns: Vec<TimestampPattern>,
}

impl TimestampMatcher {
    pub fn new(patterns: Vec<TimestampPattern>) -> Result<Self, TimestampError> {
        if patterns.is_empty() {
            return Err(TimestampError::NoPatterns);
        }
        Ok(Self { patterns })
    }

    pub fn from_config(configs: &[TimestampConfig]) -> Result<Self, TimestampError> {
        let patterns = configs
            .iter()
            .map(|c| TimestampPattern::new(&c.pattern, c.format.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(patterns)
    }

    /// Try every pattern in order, returning the raw timestamp and the index
    /// of the first one that matches.
    pub fn try_match(&self, line: &str) -> Option<(String, usize)> {
        self.patterns
            .iter()
            .enumerate()
            .find_map(|(index, pattern)| pattern.extract(line).map(|ts| (ts.to_string(), index)))
    }

    pub fn pattern(&self, index: usize) -> &TimestampPattern {
        &self.patterns[index]
    }
}

fn parse_iso8601(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TimestampError::ParseError {
            value: value.to_string(),
            format: "iso8601".to_string(),
            source: Box::new(e),
        })
}

fn parse_epoch(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let seconds: i64 = value
        .parse()
        .map_err(|e: std::num::ParseIntError| TimestampError::ParseError {
            value: value.to_string(),
            format: "epoch".to_string(),
            source: Box::new(e),
        })?;

    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| out_of_range(value, "epoch"))
}

fn parse_epoch_ms(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let millis: i64 = value
        .parse()
        .map_err(|e: std::num::ParseIntError| TimestampError::ParseError {
            value: value.to_string(),
            format: "epoch_ms".to_string(),
            source: Box::new(e),
        })?;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| out_of_range(value, "epoch_ms"))
}

fn parse_strptime(value: &str, format: &str) -> Result<DateTime<Utc>, TimestampError> {
    if format.contains("%z") || format.contains("%Z") || format.contains("%:z") {
        DateTime::parse_from_str(value, format)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TimestampError::ParseError {
                value: value.to_string(),
                format: format.to_string(),
                source: Box::new(e),
            })
    } else {
        // Zone-less formats are read as UTC
        NaiveDateTime::parse_from_str(value, format)
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .map_err(|e| TimestampError::ParseError {
                value: value.to_string(),
                format: format.to_string(),
                source: Box::new(e),
            })
    }
}

fn out_of_range(value: &str, format: &str) -> TimestampError {
    TimestampError::ParseError {
        value: value.to_string(),
        format: format.to_string(),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "timestamp out of range",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLR_PATTERN: &str = r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}) .*";
    const SOLR_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

    #[test]
    fn test_group_one_is_timestamp() {
        let pattern = TimestampPattern::new(SOLR_PATTERN, Some(SOLR_FORMAT)).unwrap();

        let raw = pattern
            .extract("2015-09-07 20:03:57.658 INFO  (main) [   ] o.e.j.u.log Logging")
            .unwrap();
        assert_eq!(raw, "2015-09-07 20:03:57.658");

        let parsed = pattern.parse(raw).unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2015-09-07T20:03:57.658+00:00");
    }

    #[test]
    fn test_named_group_wins_over_group_one() {
        let pattern =
            TimestampPattern::new(r"(INFO|WARN) - (?P<ts>\d{4}-\d{2}-\d{2});.*", Some("%Y-%m-%d"))
                .unwrap();

        assert_eq!(pattern.extract("INFO - 2015-09-07; hello"), Some("2015-09-07"));
    }

    #[test]
    fn test_pattern_must_match_whole_line() {
        let pattern = TimestampPattern::new(r"(\d{4}-\d{2}-\d{2})", None).unwrap();

        assert!(pattern.is_match("2015-09-07"));
        assert!(!pattern.is_match("2015-09-07 trailing text"));
        assert!(!pattern.is_match("    at 2015-09-07"));
    }

    #[test]
    fn test_missing_format_yields_no_parsed_timestamp() {
        let pattern = TimestampPattern::new(SOLR_PATTERN, None).unwrap();

        assert!(pattern.parse("2015-09-07 20:03:57.658").unwrap().is_none());
    }

    #[test]
    fn test_unparseable_timestamp() {
        let pattern = TimestampPattern::new(r"(\S+) .*", Some(SOLR_FORMAT)).unwrap();

        let result = pattern.parse("yesterday");
        assert!(matches!(result, Err(TimestampError::ParseError { .. })));
    }

    #[test]
    fn test_epoch_formats() {
        let seconds = TimestampPattern::new(r"(\d{10}) .*", Some("epoch")).unwrap();
        assert_eq!(
            seconds.parse("1733280131").unwrap().unwrap().timestamp(),
            1733280131
        );

        let millis = TimestampPattern::new(r"(\d{13}) .*", Some("epoch_ms")).unwrap();
        let parsed = millis.parse("1733280131011").unwrap().unwrap();
        assert_eq!(parsed.timestamp(), 1733280131);
        assert_eq!(parsed.timestamp_subsec_millis(), 11);
    }

    #[test]
    fn test_timezone_aware_strptime() {
        let pattern = TimestampPattern::new(r"(.{24}) .*", Some("%Y-%m-%d %H:%M:%S %z")).unwrap();

        let parsed = pattern.parse("2025-12-04 02:42:11 +0530").unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-12-03T21:12:11+00:00");
    }

    #[test]
    fn test_matcher_returns_first_matching_index() {
        let matcher = TimestampMatcher::new(vec![
            TimestampPattern::new(r"\[(\d+)\] .*", None).unwrap(),
            TimestampPattern::new(SOLR_PATTERN, Some(SOLR_FORMAT)).unwrap(),
            TimestampPattern::new(r"(\d{4}-\d{2}-\d{2}) .*", None).unwrap(),
        ])
        .unwrap();

        let (raw, index) = matcher.try_match("2015-09-07 20:03:57.658 INFO x").unwrap();
        assert_eq!(index, 1);
        assert_eq!(raw, "2015-09-07 20:03:57.658");

        let (raw, index) = matcher.try_match("[42] hello").unwrap();
        assert_eq!(index, 0);
        assert_eq!(raw, "42");

        assert!(matcher.try_match("\tat org.apache.solr.Foo").is_none());
    }

    #[test]
    fn test_matcher_requires_patterns() {
        assert!(matches!(
            TimestampMatcher::new(vec![]),
            Err(TimestampError::NoPatterns)
        ));
    }

    #[test]
    fn test_invalid_regex() {
        let result = TimestampPattern::new(r"([invalid", None);
        assert!(matches!(result, Err(TimestampError::InvalidRegex { .. })));
    }
}
