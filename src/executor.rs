//! Executor layer for join execution.
//!
//! A join runs as two barrier-separated stages of scoped worker threads.
//! Build workers fill a shared partitioned hash table. Once all of them have
//! been joined the table is frozen, and probe workers stream match signals
//! into per-partition counters whose partial counts are reduced to the
//! final result.

pub mod aggregate;
pub mod build;
pub mod hash_join;
pub mod probe;
mod worker;

// Re-export executors
pub use aggregate::{count_matches, reduce};
pub use hash_join::{HashJoinExecutor, JoinOutcome, JoinStats};
pub use probe::{MatchSignal, ProbeReport, ProbeWorker};
