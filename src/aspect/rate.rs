use chrono::{DateTime, Utc};

/// Events per second over the span between the earliest and latest observed
/// timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateEstimator {
    count: u64,
    min: Option<DateTime<Utc>>,
    max: Option<DateTime<Utc>>,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event. Events without a timestamp still count but do not
    /// widen the span.
    pub fn observe(&mut self, timestamp: Option<DateTime<Utc>>) {
        self.count += 1;
        if let Some(ts) = timestamp {
            self.min = Some(self.min.map_or(ts, |m| m.min(ts)));
            self.max = Some(self.max.map_or(ts, |m| m.max(ts)));
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn span_seconds(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if max > min => {
                Some((max - min).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    /// None until two distinct timestamps have been seen.
    pub fn rate(&self) -> Option<f64> {
        self.span_seconds()
            .filter(|span| *span > 0.0)
            .map(|span| self.count as f64 / span)
    }
}

pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.2}", r),
        None => "n/a".to_string(),
    }
}
