//! Block-wise reading of one partition's byte range.

use crate::concurrency::{send_or_cancel, CancellationToken};
use crate::error::JoinResult;
use crate::parser::{RecordParser, TERMINATOR};
use crate::relation::Row;
use crate::scan::partitioner::{read_exact_at, ByteRange};
use crossbeam_channel::Sender;
use std::fs::File;

/// Read `range` in blocks of `block_size` bytes and hand every parsed row to
/// `emit`. Returns the number of rows emitted.
///
/// A record cut by a block edge is carried into the next block, so `emit`
/// only ever sees whole records.
pub fn scan_range<F>(file: &File, range: ByteRange, block_size: usize, mut emit: F) -> JoinResult<u64>
where
    F: FnMut(Row) -> JoinResult<()>,
{
    let block_size = block_size.max(1);
    let mut pending: Vec<u8> = Vec::with_capacity(block_size);
    let mut pending_offset = range.start;
    let mut pos = range.start;
    let mut rows = 0u64;

    while pos < range.end {
        let len = (range.end - pos).min(block_size as u64) as usize;
        let filled = pending.len();
        pending.resize(filled + len, 0);
        read_exact_at(file, &mut pending[filled..], pos)?;
        pos += len as u64;

        if let Some(last) = pending.iter().rposition(|&b| b == TERMINATOR) {
            for row in RecordParser::new(&pending[..=last], pending_offset) {
                emit(row?)?;
                rows += 1;
            }
            pending.drain(..=last);
            pending_offset += last as u64 + 1;
        }
    }

    // Only the file's final record may lack a terminator.
    for row in RecordParser::new(&pending, pending_offset) {
        emit(row?)?;
        rows += 1;
    }
    Ok(rows)
}

/// Producer side of a partition stream: scan `range` and send each row into
/// `rows`. The stream closes when the caller drops the sender.
pub fn scan_partition(
    file: &File,
    range: ByteRange,
    block_size: usize,
    rows: &Sender<Row>,
    token: &CancellationToken,
) -> JoinResult<u64> {
    scan_range(file, range, block_size, |row| {
        token.check()?;
        send_or_cancel(rows, row, token, "scan")
    })
}
