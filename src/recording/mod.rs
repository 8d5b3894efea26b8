//! Recorded sessions: loading and the consumable reply pool

mod loader;
mod pool;

pub use loader::{from_json_str, load_file};
pub use pool::{split_group, CorrelationKey, GroupSummary, RecordingPool};
