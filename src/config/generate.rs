pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGCRUNCH CONFIGURATION
# =============================================================================
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logcrunch/config.yml
#   3. /etc/logcrunch/config.yml
# Without any of these the built-in defaults below are used.

# =============================================================================
# TIMESTAMPS
# =============================================================================
# Ordered list of line shapes. A line that matches one of these patterns starts
# a new log record; every following line that does not match is part of that
# record's body. Each scanner pins the first pattern that matches and uses only
# that one for the rest of its chunk.
#
# pattern: regex that must match the WHOLE line. The timestamp is taken from
#          the named group 'ts' if present, otherwise from group 1.
# format:  strftime format string, 'iso8601', 'epoch' or 'epoch_ms'.
#          Zone-less formats are read as UTC. Omit to skip date parsing.

timestamps:
  # Solr 5+ default layout: 2015-09-07 20:03:57.658 INFO  (qtp-1) [   ] ...
  - pattern: '(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}) .*'
    format: '%Y-%m-%d %H:%M:%S%.3f'

  # Solr 4 log4j layout: INFO  - 2015-09-07 20:03:57.658; org.apache.solr...
  - pattern: '[A-Z]+\s+- (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3});.*'
    format: '%Y-%m-%d %H:%M:%S%.3f'

  # ISO 8601 with zone: 2015-09-07T20:03:57.658Z ...
  - pattern: '(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})) .*'
    format: iso8601

# =============================================================================
# SCANNING
# =============================================================================
scan:
  # Worker threads per file; 0 uses every available core
  threads: 0
  # Bytes a chunk may read past its end to finish its last record
  overrun_bytes: 10000
  # What to do when a chunk contains no timestamped line: 'warn' or 'error'
  on_missing_timestamp: warn

# =============================================================================
# REPORTS
# =============================================================================
report:
  # Number of slowest queries listed in the query report
  slow_queries: 10
  # Number of slowest searcher load times listed in the searcher report
  slow_load_times: 5
"#
    .to_string()
}
