/// Default number of bytes a non-final chunk may read past its logical end so
/// its last record can finish.
pub const DEFAULT_OVERRUN: u64 = 10_000;

/// Logical slice of a file owned by one scanner. Records whose headline line
/// begins in `[start, end)` belong to this range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub is_final: bool,
}

impl ByteRange {
    /// End of the region the scanner is allowed to read.
    pub fn physical_end(&self, file_len: u64, overrun: u64) -> u64 {
        if self.is_final {
            file_len
        } else {
            self.end.saturating_add(overrun).min(file_len)
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `file_len` bytes into `parallelism` contiguous ranges of equal size,
/// the last one absorbing the remainder.
pub fn plan_chunks(file_len: u64, parallelism: usize) -> Vec<ByteRange> {
    let parallelism = parallelism.max(1) as u64;
    let chunk_size = file_len / parallelism;

    (0..parallelism)
        .map(|i| {
            let is_final = i == parallelism - 1;
            let start = i * chunk_size;
            let end = if is_final { file_len } else { start + chunk_size };
            ByteRange {
                start,
                end,
                is_final,
            }
        })
        .collect()
}

/// Ranges whose scan matched no headline and that no earlier record could
/// have reached through its overrun. `scanned` lists every range of a file in
/// order, paired with whether its scan matched a headline.
pub fn unreached_ranges(
    scanned: &[(ByteRange, bool)],
    file_len: u64,
    overrun: u64,
) -> Vec<ByteRange> {
    let mut reached = 0;
    let mut unreached = Vec::new();

    for &(range, matched) in scanned {
        if matched {
            reached = range.physical_end(file_len, overrun);
        } else if !range.is_empty() && reached < range.end {
            unreached.push(range);
        }
    }

    unreached
}

/// Parallelism to use when the configuration asks for automatic sizing.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
