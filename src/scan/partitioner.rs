//! Record-aligned byte partitioning of a relation file.
//!
//! A nominal cut point `k * (size / P)` usually lands inside a record. It is
//! moved forward to the first byte after a terminator, and the same resolved
//! offset is used as the end of partition `k - 1` and the start of partition
//! `k`. Adjacent ranges therefore always meet at a record boundary.

use crate::config::MAX_PARTITIONS;
use crate::error::{JoinError, JoinResult};
use crate::parser::TERMINATOR;
use std::fs::File;
use std::io;

/// Bytes read per step while scanning forward for a terminator.
const PROBE_CHUNK: usize = 256;

/// Half-open byte range `[start, end)` of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Positional read that fills `buf` completely. Does not move the file
/// cursor, so scanners may share one handle.
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> JoinResult<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match read_at(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => {
                return Err(JoinError::ShortRead {
                    offset,
                    expected: buf.len(),
                    actual: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Resolve a nominal offset to the start of the record at or after it.
///
/// A record still open at end of file resolves to `size`, so it stays whole in
/// the partition before the cut.
pub fn resolve_boundary(file: &File, size: u64, offset: u64) -> JoinResult<u64> {
    if offset > size {
        return Err(JoinError::BoundaryPastEof { offset, size });
    }
    if offset == 0 || offset == size {
        return Ok(offset);
    }

    let mut pair = [0u8; 2];
    read_exact_at(file, &mut pair, offset - 1)?;
    if pair[0] == TERMINATOR {
        return Ok(offset);
    }
    if pair[1] == TERMINATOR {
        return Ok(offset + 1);
    }

    let mut pos = offset + 1;
    let mut chunk = [0u8; PROBE_CHUNK];
    while pos < size {
        let len = (size - pos).min(PROBE_CHUNK as u64) as usize;
        read_exact_at(file, &mut chunk[..len], pos)?;
        if let Some(idx) = chunk[..len].iter().position(|&b| b == TERMINATOR) {
            return Ok(pos + idx as u64 + 1);
        }
        pos += len as u64;
    }
    Ok(size)
}

/// Split a file of `size` bytes into `partitions` record-aligned ranges.
///
/// Always returns exactly `partitions` ranges; some may be empty when the
/// file is small. The ranges are contiguous and cover `[0, size)`.
pub fn partition_ranges(file: &File, size: u64, partitions: usize) -> JoinResult<Vec<ByteRange>> {
    if partitions == 0 {
        return Err(JoinError::InvalidConfig(
            "partition count must be at least 1".to_string(),
        ));
    }
    if partitions > MAX_PARTITIONS {
        return Err(JoinError::InvalidConfig(format!(
            "partition count must be at most {}, got {}",
            MAX_PARTITIONS, partitions
        )));
    }

    let stride = size / partitions as u64;
    let mut cuts = Vec::with_capacity(partitions + 1);
    cuts.push(0);
    for k in 1..partitions {
        let resolved = resolve_boundary(file, size, k as u64 * stride)?;
        // A long record may carry one cut past the next nominal point.
        let previous = cuts.last().copied().unwrap_or(0);
        cuts.push(resolved.max(previous));
    }
    cuts.push(size);

    Ok(cuts
        .windows(2)
        .map(|w| ByteRange::new(w[0], w[1]))
        .collect())
}
