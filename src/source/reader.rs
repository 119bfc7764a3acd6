use crate::config::types::MissingTimestampPolicy;
use crate::source::chunk::{ByteRange, DEFAULT_OVERRUN};
use crate::source::timestamp::{TimestampMatcher, TimestampPattern};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("no timestamp pattern matched between bytes {start} and {end}")]
    NoTimestamp { start: u64, end: u64 },
}

/// One logical log entry: a headline that matched the pinned timestamp
/// pattern plus the continuation lines that followed it.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub source_file: String,
    pub offset: u64,
    pub raw_timestamp: String,
    pub parsed_timestamp: Option<DateTime<Utc>>,
    pub headline: String,
    /// Continuation lines, each terminated by `\n`.
    pub body: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub overrun: u64,
    pub on_missing_timestamp: MissingTimestampPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            overrun: DEFAULT_OVERRUN,
            on_missing_timestamp: MissingTimestampPolicy::Warn,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub records: u64,
    pub unparsed_timestamps: u64,
    /// `None` when no line in the chunk's readable region matched a pattern.
    pub pinned_pattern: Option<usize>,
}

/// Scans one byte range of a file and reassembles its records.
///
/// The scanner first aligns to the first full line at or after `range.start`,
/// then searches for a line matching any configured timestamp pattern. That
/// pattern is pinned for the rest of the scan. Records are emitted in file
/// order; the last record owned by the range may extend into the overrun.
pub struct ChunkScanner {
    path: PathBuf,
    source_file: String,
    file_len: u64,
    range: ByteRange,
    matcher: Arc<TimestampMatcher>,
    options: ScanOptions,
}

struct PendingRecord {
    offset: u64,
    headline: String,
    body: String,
}

impl ChunkScanner {
    pub fn new(
        path: PathBuf,
        file_len: u64,
        range: ByteRange,
        matcher: Arc<TimestampMatcher>,
        options: ScanOptions,
    ) -> Self {
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            path,
            source_file,
            file_len,
            range,
            matcher,
            options,
        }
    }

    /// Scan the range, handing every completed record to `emit`.
    pub fn scan<F>(&self, emit: F) -> Result<ScanStats, ScanError>
    where
        F: FnMut(LogRecord),
    {
        let stats = self.scan_range(emit)?;

        if stats.unparsed_timestamps > 0 {
            warn!(
                file = %self.source_file,
                start = self.range.start,
                count = stats.unparsed_timestamps,
                "Timestamps could not be parsed with the configured date format"
            );
        }
        debug!(
            file = %self.source_file,
            start = self.range.start,
            end = self.range.end,
            records = stats.records,
            "Chunk scanned"
        );

        Ok(stats)
    }

    fn scan_range<F>(&self, mut emit: F) -> Result<ScanStats, ScanError>
    where
        F: FnMut(LogRecord),
    {
        let mut stats = ScanStats::default();
        if self.range.is_empty() {
            return Ok(stats);
        }

        let physical_end = self.range.physical_end(self.file_len, self.options.overrun);
        // Start one byte early so we can tell whether `start` is a line start
        let read_start = self.range.start.saturating_sub(1);

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(read_start))?;
        let limited = file.take(physical_end.saturating_sub(read_start));
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, limited);
        let mut lines = LineReader::new(reader, read_start);

        if self.range.start > 0 {
            lines.align()?;
        }

        let mut buf = Vec::new();

        let (pinned, mut pending) = loop {
            let Some(line_start) = lines.next_line(&mut buf)? else {
                debug!(
                    file = %self.source_file,
                    start = self.range.start,
                    end = physical_end,
                    "No timestamp match in chunk"
                );
                return Ok(stats);
            };
            let text = String::from_utf8_lossy(&buf);
            if let Some((_, index)) = self.matcher.try_match(&text) {
                if line_start >= self.range.end {
                    stats.pinned_pattern = Some(index);
                    debug!(
                        file = %self.source_file,
                        start = self.range.start,
                        "Chunk holds only the continuation of an earlier record"
                    );
                    return Ok(stats);
                }
                let pending = PendingRecord {
                    offset: line_start,
                    headline: text.into_owned(),
                    body: String::new(),
                };
                break (index, pending);
            }
        };

        let pattern = self.matcher.pattern(pinned);
        stats.pinned_pattern = Some(pinned);

        while let Some(line_start) = lines.next_line(&mut buf)? {
            let text = String::from_utf8_lossy(&buf);
            if pattern.is_match(&text) {
                if line_start >= self.range.end {
                    // Next range owns this headline
                    break;
                }
                let next = PendingRecord {
                    offset: line_start,
                    headline: text.into_owned(),
                    body: String::new(),
                };
                let finished = std::mem::replace(&mut pending, next);
                emit(self.finish(pattern, finished, &mut stats));
            } else {
                pending.body.push_str(&text);
                pending.body.push('\n');
            }
        }

        emit(self.finish(pattern, pending, &mut stats));
        Ok(stats)
    }

    fn finish(
        &self,
        pattern: &TimestampPattern,
        pending: PendingRecord,
        stats: &mut ScanStats,
    ) -> LogRecord {
        let raw_timestamp = pattern
            .extract(&pending.headline)
            .unwrap_or_default()
            .to_string();

        let parsed_timestamp = match pattern.parse(&raw_timestamp) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(
                    file = %self.source_file,
                    offset = pending.offset,
                    error = %e,
                    "Unparseable timestamp"
                );
                stats.unparsed_timestamps += 1;
                None
            }
        };

        stats.records += 1;
        LogRecord {
            source_file: self.source_file.clone(),
            offset: pending.offset,
            raw_timestamp,
            parsed_timestamp,
            headline: pending.headline,
            body: pending.body,
        }
    }
}

/// Byte-oriented line reader that understands `\n`, `\r` and `\r\n`
/// terminators and tracks the absolute file offset of every line.
struct LineReader<R> {
    inner: R,
    offset: u64,
}

impl<R: BufRead> LineReader<R> {
    fn new(inner: R, offset: u64) -> Self {
        Self { inner, offset }
    }

    fn consume(&mut self, amount: usize) {
        self.inner.consume(amount);
        self.offset += amount as u64;
    }

    /// Read the next line into `buf` without its terminator. Returns the
    /// offset at which the line starts, or `None` at end of input.
    fn next_line(&mut self, buf: &mut Vec<u8>) -> io::Result<Option<u64>> {
        buf.clear();
        let line_start = self.offset;
        let mut read_any = false;

        loop {
            let (used, terminator) = {
                let available = self.inner.fill_buf()?;
                if available.is_empty() {
                    return Ok(read_any.then_some(line_start));
                }
                match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                    Some(i) => {
                        buf.extend_from_slice(&available[..i]);
                        (i + 1, Some(available[i]))
                    }
                    None => {
                        buf.extend_from_slice(available);
                        (available.len(), None)
                    }
                }
            };
            read_any = true;
            self.consume(used);

            match terminator {
                Some(b'\r') => {
                    self.skip_lf()?;
                    return Ok(Some(line_start));
                }
                Some(_) => return Ok(Some(line_start)),
                None => {}
            }
        }
    }

    fn skip_lf(&mut self) -> io::Result<()> {
        let is_lf = self.inner.fill_buf()?.first() == Some(&b'\n');
        if is_lf {
            self.consume(1);
        }
        Ok(())
    }

    /// Called with the reader positioned one byte before the range start.
    /// Leaves the reader at the first line that begins at or after it.
    fn align(&mut self) -> io::Result<()> {
        let previous = self.inner.fill_buf()?.first().copied();
        let Some(previous) = previous else {
            return Ok(());
        };
        self.consume(1);

        match previous {
            b'\n' => Ok(()),
            b'\r' => self.skip_lf(),
            _ => {
                let mut partial = Vec::new();
                self.next_line(&mut partial)?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::chunk::plan_chunks;
    use crate::source::timestamp::TimestampPattern;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SOLR_PATTERN: &str = r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}) .*";
    const SOLR_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

    fn solr_matcher() -> Arc<TimestampMatcher> {
        let pattern = TimestampPattern::new(SOLR_PATTERN, Some(SOLR_FORMAT)).unwrap();
        Arc::new(TimestampMatcher::new(vec![pattern]).unwrap())
    }

    fn write_log(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn file_len(file: &NamedTempFile) -> u64 {
        file.as_file().metadata().unwrap().len()
    }

    fn whole_file(file: &NamedTempFile) -> ByteRange {
        plan_chunks(file_len(file), 1)[0]
    }

    fn byte_range(start: u64, end: u64, is_final: bool) -> ByteRange {
        ByteRange {
            start,
            end,
            is_final,
        }
    }

    fn scan_range(
        file: &NamedTempFile,
        range: ByteRange,
        options: ScanOptions,
    ) -> Result<Vec<LogRecord>, ScanError> {
        let path = file.path().to_path_buf();
        let scanner = ChunkScanner::new(path, file_len(file), range, solr_matcher(), options);
        let mut records = Vec::new();
        scanner.scan(|r| records.push(r))?;
        Ok(records)
    }

    fn scan_parallel(file: &NamedTempFile, parallelism: usize) -> Vec<LogRecord> {
        let mut records: Vec<LogRecord> = plan_chunks(file_len(file), parallelism)
            .into_iter()
            .flat_map(|range| scan_range(file, range, ScanOptions::default()).unwrap())
            .collect();
        records.sort_by_key(|r| r.offset);
        records
    }

    fn sample_log(entries: usize) -> String {
        let mut log = String::new();
        for i in 0..entries {
            log.push_str(&format!(
                "2015-09-07 20:{:02}:{:02}.{:03} INFO  (qtp-{}) [   ] o.a.s.c.S.Request entry {}\n",
                (i / 60) % 60,
                i % 60,
                i % 1000,
                i,
                i
            ));
            for line in 0..(i % 4) {
                log.push_str(&format!(
                    "\tat org.apache.solr.Frame{}.call(Frame.java:{})\n",
                    line, i
                ));
            }
        }
        log
    }

    #[test]
    fn test_multiline_records() {
        let file = write_log(
            "2015-09-07 20:03:57.658 ERROR (qtp-1) [   ] o.a.s.c.SolrException; boom\n\
             \tat org.apache.solr.A.b(A.java:1)\n\
             \tat java.lang.Thread.run(Thread.java:745)\n\
             2015-09-07 20:03:58.001 INFO  (qtp-2) [   ] o.a.s.c.S.Request done\n",
        );

        let records = scan_range(&file, whole_file(&file), ScanOptions::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw_timestamp, "2015-09-07 20:03:57.658");
        assert_eq!(
            records[0].body,
            "\tat org.apache.solr.A.b(A.java:1)\n\tat java.lang.Thread.run(Thread.java:745)\n"
        );
        assert_eq!(records[0].offset, 0);
        assert_eq!(
            records[0].parsed_timestamp.unwrap().to_rfc3339(),
            "2015-09-07T20:03:57.658+00:00"
        );
        assert_eq!(records[1].raw_timestamp, "2015-09-07 20:03:58.001");
        assert_eq!(records[1].body, "");
    }

    #[test]
    fn test_record_count_is_independent_of_parallelism() {
        let file = write_log(&sample_log(200));
        let baseline = scan_parallel(&file, 1);
        assert_eq!(baseline.len(), 200);

        for parallelism in 2..=16 {
            let records = scan_parallel(&file, parallelism);
            assert_eq!(records, baseline, "parallelism {}", parallelism);
        }
    }

    #[test]
    fn test_body_never_contains_a_headline() {
        let file = write_log(&sample_log(120));
        let pattern = TimestampPattern::new(SOLR_PATTERN, None).unwrap();

        for parallelism in [1, 3, 7] {
            for record in scan_parallel(&file, parallelism) {
                assert!(pattern.is_match(&record.headline));
                assert!(record.body.lines().all(|line| !pattern.is_match(line)));
            }
        }
    }

    #[test]
    fn test_boundary_at_line_start_is_owned_by_next_range() {
        let first = "2015-09-07 20:03:57.658 INFO  (a) first\nbody one\n";
        let second = "2015-09-07 20:03:58.658 INFO  (b) second\nbody two\n";
        let file = write_log(&format!("{}{}", first, second));
        let split = first.len() as u64;
        let len = (first.len() + second.len()) as u64;

        let left = scan_range(&file, byte_range(0, split, false), ScanOptions::default()).unwrap();
        let right =
            scan_range(&file, byte_range(split, len, true), ScanOptions::default()).unwrap();

        assert_eq!(left.len(), 1);
        assert_eq!(left[0].headline, "2015-09-07 20:03:57.658 INFO  (a) first");
        assert_eq!(left[0].body, "body one\n");
        assert_eq!(right.len(), 1);
        assert_eq!(right[0].headline, "2015-09-07 20:03:58.658 INFO  (b) second");
        assert_eq!(right[0].offset, split);
    }

    #[test]
    fn test_boundary_inside_headline_is_owned_by_previous_range() {
        let first = "2015-09-07 20:03:57.658 INFO  (a) first\n";
        let second = "2015-09-07 20:03:58.658 INFO  (b) second\ntrailing body\n";
        let file = write_log(&format!("{}{}", first, second));
        let split = first.len() as u64 + 5;
        let len = (first.len() + second.len()) as u64;

        let left = scan_range(&file, byte_range(0, split, false), ScanOptions::default()).unwrap();
        let right =
            scan_range(&file, byte_range(split, len, true), ScanOptions::default()).unwrap();

        assert_eq!(left.len(), 2);
        assert_eq!(left[1].body, "trailing body\n");
        assert!(right.is_empty());
    }

    #[test]
    fn test_overrun_limits_how_far_a_record_can_extend() {
        let first = "2015-09-07 20:03:57.658 INFO  (a) first\n";
        let body = "0123456789\n".repeat(10);
        let file = write_log(&format!("{}{}", first, body));
        let options = ScanOptions {
            overrun: 22,
            ..ScanOptions::default()
        };

        let records = scan_range(&file, byte_range(0, first.len() as u64, false), options).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, "0123456789\n0123456789\n");
    }

    #[test]
    fn test_crlf_and_cr_terminators() {
        let file = write_log(
            "2015-09-07 20:03:57.658 INFO  (a) one\r\nbody a\r\n\
             2015-09-07 20:03:58.658 INFO  (b) two\rbody b\r\
             2015-09-07 20:03:59.658 INFO  (c) three",
        );
        let records = scan_range(&file, whole_file(&file), ScanOptions::default()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].body, "body a\n");
        assert_eq!(records[1].headline, "2015-09-07 20:03:58.658 INFO  (b) two");
        assert_eq!(records[1].body, "body b\n");
        assert_eq!(records[2].headline, "2015-09-07 20:03:59.658 INFO  (c) three");
    }

    #[test]
    fn test_crlf_split_across_boundary() {
        let first = "2015-09-07 20:03:57.658 INFO  (a) one\r\n";
        let second = "2015-09-07 20:03:58.658 INFO  (b) two\r\n";
        let file = write_log(&format!("{}{}", first, second));
        // Boundary falls between '\r' and '\n'
        let split = first.len() as u64 - 1;
        let len = (first.len() + second.len()) as u64;

        let left = scan_range(&file, byte_range(0, split, false), ScanOptions::default()).unwrap();
        let right =
            scan_range(&file, byte_range(split, len, true), ScanOptions::default()).unwrap();

        assert_eq!(left.len(), 1);
        assert_eq!(right.len(), 1);
        assert_eq!(right[0].headline, "2015-09-07 20:03:58.658 INFO  (b) two");
    }

    #[test]
    fn test_leading_lines_without_timestamp_are_skipped() {
        let file = write_log("garbage\nmore garbage\n2015-09-07 20:03:57.658 INFO  (a) one\n");
        let records = scan_range(&file, whole_file(&file), ScanOptions::default()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].offset, "garbage\nmore garbage\n".len() as u64);
    }

    #[test]
    fn test_chunk_without_timestamp_matches_nothing() {
        let file = write_log("no timestamps here\nnor here\n");
        let scanner = ChunkScanner::new(
            file.path().to_path_buf(),
            file_len(&file),
            whole_file(&file),
            solr_matcher(),
            ScanOptions::default(),
        );

        let mut records = Vec::new();
        let stats = scanner.scan(|r| records.push(r)).unwrap();

        assert!(records.is_empty());
        assert_eq!(stats.pinned_pattern, None);
    }

    #[test]
    fn test_continuation_only_range_still_reports_a_match() {
        let first = "2015-09-07 20:03:57.658 INFO  (a) first\n";
        let body = "\tat org.apache.solr.Frame.call(Frame.java:1)\n";
        let second = "2015-09-07 20:03:58.658 INFO  (b) second\n";
        let file = write_log(&format!("{}{}{}", first, body, second));
        let start = first.len() as u64 + 3;
        let end = (first.len() + body.len()) as u64;
        let scanner = ChunkScanner::new(
            file.path().to_path_buf(),
            file_len(&file),
            byte_range(start, end, false),
            solr_matcher(),
            ScanOptions::default(),
        );

        let mut records = Vec::new();
        let stats = scanner.scan(|r| records.push(r)).unwrap();

        assert!(records.is_empty());
        assert_eq!(stats.pinned_pattern, Some(0));
    }

    #[test]
    fn test_unparseable_timestamp_keeps_record() {
        let pattern =
            TimestampPattern::new(r"(\d{4}-\d{2}-\d{2}) .*", Some("%d/%m/%Y %H")).unwrap();
        let matcher = Arc::new(TimestampMatcher::new(vec![pattern]).unwrap());
        let file = write_log("2015-09-07 something happened\n");
        let scanner = ChunkScanner::new(
            file.path().to_path_buf(),
            file_len(&file),
            whole_file(&file),
            matcher,
            ScanOptions::default(),
        );

        let mut records = Vec::new();
        let stats = scanner.scan(|r| records.push(r)).unwrap();

        assert_eq!(stats.records, 1);
        assert_eq!(stats.unparsed_timestamps, 1);
        assert_eq!(records[0].raw_timestamp, "2015-09-07");
        assert!(records[0].parsed_timestamp.is_none());
    }

    #[test]
    fn test_pinned_pattern_is_not_reevaluated() {
        let matcher = Arc::new(
            TimestampMatcher::new(vec![
                TimestampPattern::new(r"\[(\d+)\] .*", None).unwrap(),
                TimestampPattern::new(SOLR_PATTERN, Some(SOLR_FORMAT)).unwrap(),
            ])
            .unwrap(),
        );
        let file = write_log(
            "2015-09-07 20:03:57.658 INFO  (a) one\n\
             [17] looks like the first pattern\n\
             2015-09-07 20:03:58.658 INFO  (b) two\n",
        );
        let scanner = ChunkScanner::new(
            file.path().to_path_buf(),
            file_len(&file),
            whole_file(&file),
            matcher,
            ScanOptions::default(),
        );

        let mut records = Vec::new();
        let stats = scanner.scan(|r| records.push(r)).unwrap();

        assert_eq!(stats.pinned_pattern, Some(1));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].body, "[17] looks like the first pattern\n");
    }

    #[test]
    fn test_source_file_is_file_name() {
        let file = write_log("2015-09-07 20:03:57.658 INFO  (a) one\n");
        let records = scan_range(&file, whole_file(&file), ScanOptions::default()).unwrap();

        let expected = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(records[0].source_file, expected);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let scanner = ChunkScanner::new(
            PathBuf::from("/nonexistent/solr.log"),
            100,
            plan_chunks(100, 1)[0],
            solr_matcher(),
            ScanOptions::default(),
        );

        assert!(matches!(scanner.scan(|_| {}), Err(ScanError::Io(_))));
    }
}
