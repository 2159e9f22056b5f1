//! Record parser.
//!
//! A record is one line holding exactly two unsigned integer fields. Every
//! byte that is not an ASCII digit separates fields, so `1,2`, `1 2` and
//! `(1;2)` all parse to the same row. Lines holding only whitespace are not
//! records and are skipped.

use crate::error::{JoinError, JoinResult};
use crate::relation::Row;

/// Record terminator.
pub const TERMINATOR: u8 = b'\n';

/// Why a single line failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The line did not contain exactly two digit runs.
    FieldCount(usize),
    /// A digit run does not fit in an `i64`.
    Overflow,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::FieldCount(n) => write!(f, "expected 2 integer fields, found {}", n),
            RecordError::Overflow => write!(f, "integer field overflows i64"),
        }
    }
}

/// Parse a single line, without its terminator.
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_record(line: &[u8]) -> Result<Option<Row>, RecordError> {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }

    let mut fields = [0i64; 2];
    let mut found = 0usize;
    let mut current: Option<i64> = None;

    for &byte in line {
        if byte.is_ascii_digit() {
            let digit = i64::from(byte - b'0');
            let value = current.unwrap_or(0);
            let value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or(RecordError::Overflow)?;
            current = Some(value);
        } else if let Some(value) = current.take() {
            if found < fields.len() {
                fields[found] = value;
            }
            found += 1;
        }
    }
    if let Some(value) = current {
        if found < fields.len() {
            fields[found] = value;
        }
        found += 1;
    }

    if found != 2 {
        return Err(RecordError::FieldCount(found));
    }
    Ok(Some(Row::new(fields[0], fields[1])))
}

/// Iterator over the records of a buffer that starts at `base_offset` in its
/// file.
///
/// The final line does not need a terminator.
pub struct RecordParser<'a> {
    data: &'a [u8],
    pos: usize,
    base_offset: u64,
}

impl<'a> RecordParser<'a> {
    pub fn new(data: &'a [u8], base_offset: u64) -> Self {
        Self {
            data,
            pos: 0,
            base_offset,
        }
    }
}

impl Iterator for RecordParser<'_> {
    type Item = JoinResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let start = self.pos;
            let rest = &self.data[start..];
            let (line, consumed) = match rest.iter().position(|&b| b == TERMINATOR) {
                Some(idx) => (&rest[..idx], idx + 1),
                None => (rest, rest.len()),
            };
            self.pos += consumed;

            match parse_record(line) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(reason) => {
                    // Stop after the first malformed record.
                    self.pos = self.data.len();
                    return Some(Err(JoinError::Parse {
                        offset: self.base_offset + start as u64,
                        reason: reason.to_string(),
                    }));
                }
            }
        }
        None
    }
}
