//! Memory subsystems: the short-term buffer and the long-term record store.

pub mod long_term;
pub mod short_term;

pub use long_term::{DEFAULT_DECAY_RATE, LongTermMemory};
pub use short_term::{DEFAULT_COMPRESSION_THRESHOLD, ShortTermMemory, format_transcript};
