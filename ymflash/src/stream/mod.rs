//! Device output handling for interactive exchanges.
//!
//! Serial reads fragment device output arbitrarily. [`DebouncedChunker`]
//! regroups it into the bursts the device actually wrote, [`ChunkReader`]
//! pulls those bursts from a transport, and [`TriggerMatcher`] answers
//! prompts found in them.

mod chunker;
mod reader;
mod trigger;

pub use chunker::{DEFAULT_QUIET_PERIOD, DebouncedChunker};
pub use reader::ChunkReader;
pub use trigger::{Responder, ResponseLog, TriggerMatcher};
