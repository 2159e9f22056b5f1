//! Build stage: populate the partitioned hash table.
//!
//! Workers are interchangeable. Each inserts `(a, b)` for every row of its
//! own partition, and the table contents depend only on the set of rows
//! inserted.

use crate::concurrency::{recv_or_cancel, CancellationToken};
use crate::error::JoinResult;
use crate::hash_table::PartitionedHashTable;
use crate::relation::Row;
use crossbeam_channel::Receiver;

/// Insert an index range of a materialized relation.
pub fn insert_rows(
    table: &PartitionedHashTable,
    rows: &[Row],
    token: &CancellationToken,
) -> JoinResult<u64> {
    for row in rows {
        token.check()?;
        table.insert(row.a, row.b);
    }
    Ok(rows.len() as u64)
}

/// Insert every row of a scanner's stream until the scanner hangs up.
pub fn insert_stream(
    table: &PartitionedHashTable,
    rows: Receiver<Row>,
    token: &CancellationToken,
) -> JoinResult<u64> {
    let mut inserted = 0u64;
    while let Some(row) = recv_or_cancel(&rows, token)? {
        table.insert(row.a, row.b);
        inserted += 1;
    }
    Ok(inserted)
}
