pub mod concurrency;
pub mod config;
pub mod datagen;
pub mod error;
pub mod executor;
pub mod hash_table;
pub mod parser;
pub mod relation;
pub mod scan;

pub use config::{BuildSide, FilterPredicate, JoinConfig, ProbeComparison, ScanMode};
pub use error::{JoinError, JoinResult};
pub use executor::{HashJoinExecutor, JoinOutcome, JoinStats};
pub use relation::{Row, Side, Table};

use std::path::Path;

/// Open both relation files and join them. Both files are closed when the
/// join returns.
pub fn join_files(
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
    config: JoinConfig,
) -> JoinResult<JoinOutcome> {
    let executor = HashJoinExecutor::new(config)?;
    let mut left = Table::open(Side::Left, left)?;
    let mut right = Table::open(Side::Right, right)?;
    executor.execute(&mut left, &mut right)
}
