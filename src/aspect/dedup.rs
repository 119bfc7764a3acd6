use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One sighting of a deduplicated message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Occurrence {
    pub timestamp: Option<DateTime<Utc>>,
    pub raw_timestamp: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct DedupEntry {
    pub text: String,
    occurrences: Vec<Occurrence>,
}

impl DedupEntry {
    /// Earliest occurrence time. A missing timestamp sorts before any known one.
    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.occurrences.iter().map(|o| o.timestamp).min().flatten()
    }

    pub fn occurrence_count(&self) -> usize {
        self.occurrences.len()
    }

    pub fn sorted_occurrences(&self) -> Vec<&Occurrence> {
        let mut sorted: Vec<_> = self.occurrences.iter().collect();
        sorted.sort();
        sorted
    }
}

/// Groups records by a digest of their normalized text.
#[derive(Debug, Default)]
pub struct DedupSet {
    entries: HashMap<Vec<u8>, DedupEntry>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an occurrence of `text`. Returns true when the text was not seen before.
    pub fn insert(&mut self, text: String, occurrence: Occurrence) -> bool {
        let key = Sha256::digest(text.as_bytes()).to_vec();

        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.occurrences.push(occurrence);
                false
            }
            None => {
                self.entries.insert(
                    key,
                    DedupEntry {
                        text,
                        occurrences: vec![occurrence],
                    },
                );
                true
            }
        }
    }

    /// Number of unique texts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn occurrence_count(&self) -> usize {
        self.entries.values().map(|e| e.occurrences.len()).sum()
    }

    /// Entries ordered by first occurrence, entries with an unknown timestamp
    /// first, ties broken by text.
    pub fn sorted_entries(&self) -> Vec<&DedupEntry> {
        let mut sorted: Vec<_> = self.entries.values().collect();
        sorted.sort_by(|a, b| {
            a.earliest()
                .cmp(&b.earliest())
                .then_with(|| a.text.cmp(&b.text))
        });
        sorted
    }
}
