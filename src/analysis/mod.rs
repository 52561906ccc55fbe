//! Graph analysis: scheduling and cycle detection.
pub mod topology;

pub use topology::{find_cycle, schedule};
