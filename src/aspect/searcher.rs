use super::topk::TopK;
use super::{earliest, lock, Aspect, Flow};
use crate::source::LogRecord;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};
use std::sync::Mutex;

static OPEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?s).*?Opening Searcher@(\S+?)(?:\[.*?\])? (realtime|main).*$")
        .expect("failed to compile searcher open regex")
});
static REGISTER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?s).*?Registered new searcher Searcher@(\S+?)(?:\[.*?\])? .*$")
        .expect("failed to compile searcher register regex")
});

#[derive(Debug, Default)]
struct SearcherState {
    main_opened: HashMap<String, Option<DateTime<Utc>>>,
    realtime_opened: HashMap<String, Option<DateTime<Utc>>>,
    registered: HashMap<String, Option<DateTime<Utc>>>,
    main_opens: u64,
    realtime_opens: u64,
    registrations: u64,
}

/// Tracks searcher open and register events to compute warm-up times.
#[derive(Debug)]
pub struct OpenSearcherAspect {
    slowest: usize,
    state: Mutex<SearcherState>,
}

/// Load-time figures derived from the events seen so far.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTimes {
    pub average_ms: Option<f64>,
    /// Slowest loads in milliseconds, largest first.
    pub slowest_ms: Vec<i64>,
    /// Main searchers opened but never registered, sorted by id.
    pub unregistered: Vec<String>,
}

fn note(map: &mut HashMap<String, Option<DateTime<Utc>>>, id: &str, ts: Option<DateTime<Utc>>) {
    let slot = map.entry(id.to_string()).or_insert(ts);
    *slot = earliest(*slot, ts);
}

impl OpenSearcherAspect {
    pub fn new(slowest: usize) -> Self {
        Self {
            slowest,
            state: Mutex::new(SearcherState::default()),
        }
    }

    pub fn main_opens(&self) -> u64 {
        lock(&self.state).main_opens
    }

    pub fn realtime_opens(&self) -> u64 {
        lock(&self.state).realtime_opens
    }

    pub fn registrations(&self) -> u64 {
        lock(&self.state).registrations
    }

    pub fn load_times(&self) -> LoadTimes {
        let state = lock(&self.state);
        let mut top = TopK::new(self.slowest);
        let mut total_ms: i64 = 0;
        let mut samples: u32 = 0;
        let mut unregistered = BTreeSet::new();

        for (id, opened) in &state.main_opened {
            match state.registered.get(id) {
                Some(registered) => {
                    if let (Some(open), Some(reg)) = (opened, registered) {
                        let ms = (*reg - *open).num_milliseconds();
                        total_ms += ms;
                        samples += 1;
                        top.push(ms, id.clone());
                    }
                }
                None => {
                    unregistered.insert(id.clone());
                }
            }
        }

        let slowest_ms = top.sorted_desc().iter().map(|i| i.order_key).collect();
        LoadTimes {
            average_ms: (samples > 0).then(|| total_ms as f64 / f64::from(samples)),
            slowest_ms,
            unregistered: unregistered.into_iter().collect(),
        }
    }
}

impl Aspect for OpenSearcherAspect {
    fn name(&self) -> &'static str {
        "searcher"
    }

    fn process(&self, record: &LogRecord) -> Flow {
        let line = &record.headline;
        let ts = record.parsed_timestamp;

        if let Some(caps) = OPEN_REGEX.captures(line) {
            let mut state = lock(&self.state);
            if &caps[2] == "main" {
                state.main_opens += 1;
                note(&mut state.main_opened, &caps[1], ts);
            } else {
                state.realtime_opens += 1;
                note(&mut state.realtime_opened, &caps[1], ts);
            }
        } else if let Some(caps) = REGISTER_REGEX.captures(line) {
            let mut state = lock(&self.state);
            state.registrations += 1;
            note(&mut state.registered, &caps[1], ts);
        }
        Flow::Continue
    }

    fn summary_line(&self) -> String {
        let state = lock(&self.state);
        format!(
            "Searchers: {} main opens, {} realtime opens, {} registered",
            state.main_opens, state.realtime_opens, state.registrations
        )
    }

    fn print_report(&self, out: &mut dyn Write) -> io::Result<()> {
        let times = self.load_times();

        writeln!(out, "Searcher Report")?;
        writeln!(out, "-----------------")?;
        writeln!(out, "SolrIndexSearcher main open events: {}", self.main_opens())?;
        writeln!(
            out,
            "SolrIndexSearcher realtime open events: {}",
            self.realtime_opens()
        )?;
        writeln!(out, "SolrIndexSearcher register events: {}", self.registrations())?;

        if let Some(avg) = times.average_ms {
            writeln!(out, "Avg Searcher Load Time: {:.1} seconds", avg / 1000.0)?;
        }
        if !times.slowest_ms.is_empty() {
            writeln!(out, "{} Slowest Load Times:", times.slowest_ms.len())?;
            for ms in &times.slowest_ms {
                writeln!(out, "{:.1} seconds", *ms as f64 / 1000.0)?;
            }
        }
        if !times.unregistered.is_empty() {
            writeln!(
                out,
                "Found {} searchers that were not registered: {}",
                times.unregistered.len(),
                times.unregistered.join(", ")
            )?;
        }
        writeln!(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
