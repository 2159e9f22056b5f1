//! Deterministic synthetic relations.

use crate::error::{JoinError, JoinResult};
use crate::relation::Row;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Shape of a generated relation. Keys are drawn from `0..keys` and values
/// from `0..=max_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetShape {
    pub rows: usize,
    pub keys: i64,
    pub max_value: i64,
    pub seed: u64,
}

impl Default for DatasetShape {
    fn default() -> Self {
        Self {
            rows: 100_000,
            keys: 20_000,
            max_value: 1_000_000,
            seed: 42,
        }
    }
}

/// Same shape and seed, same rows.
pub fn generate(shape: &DatasetShape) -> Vec<Row> {
    let mut rng = StdRng::seed_from_u64(shape.seed);
    let keys = shape.keys.max(1);
    let max_value = shape.max_value.max(0);
    (0..shape.rows)
        .map(|_| Row::new(rng.gen_range(0..keys), rng.gen_range(0..=max_value)))
        .collect()
}

/// Write `rows` as `a,b\n` records.
pub fn write_rows(path: impl AsRef<Path>, rows: &[Row]) -> JoinResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| JoinError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = BufWriter::new(file);
    for row in rows {
        writeln!(writer, "{},{}", row.a, row.b)?;
    }
    writer.flush()?;
    Ok(())
}
