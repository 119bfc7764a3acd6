pub mod chunk;
pub mod discovery;
pub mod reader;
pub mod timestamp;

pub use chunk::{plan_chunks, unreached_ranges, ByteRange};
pub use reader::{ChunkScanner, LogRecord, ScanError, ScanOptions, ScanStats};
pub use timestamp::{TimestampError, TimestampMatcher, TimestampPattern};
