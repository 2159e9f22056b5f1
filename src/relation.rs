//! Rows and table handles.

use crate::error::{JoinError, JoinResult};
use crate::parser::parse_record;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A two-integer record: join key `a` and filter attribute `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Row {
    pub a: i64,
    pub b: i64,
}

impl Row {
    pub fn new(a: i64, b: i64) -> Self {
        Self { a, b }
    }

    /// Byte length of this row written as `a,b\n`.
    pub fn encoded_len(&self) -> u64 {
        fn digits(v: i64) -> u64 {
            let mut n = if v < 0 { 2 } else { 1 };
            let mut v = v.unsigned_abs();
            while v >= 10 {
                v /= 10;
                n += 1;
            }
            n
        }
        digits(self.a) + digits(self.b) + 2
    }
}

/// Which physical relation a table is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// relation1
    Left,
    /// relation2
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "relation1"),
            Side::Right => write!(f, "relation2"),
        }
    }
}

/// Backing storage of a table.
#[derive(Debug)]
pub enum TableSource {
    /// Scanned in byte ranges by the partitioned path.
    File { file: File, path: PathBuf },
    /// Fully materialized rows.
    Rows(Vec<Row>),
}

/// A relation taking part in a join.
#[derive(Debug)]
pub struct Table {
    side: Side,
    size: u64,
    source: TableSource,
}

impl Table {
    /// Open a relation file and record its size.
    pub fn open(side: Side, path: impl AsRef<Path>) -> JoinResult<Self> {
        let path = path.as_ref();
        let open_err = |source: std::io::Error| JoinError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_err)?;
        let size = file.metadata().map_err(open_err)?.len();

        Ok(Self {
            side,
            size,
            source: TableSource::File {
                file,
                path: path.to_path_buf(),
            },
        })
    }

    /// Build an in-memory table. Its size is the length the rows would have
    /// as text, so build side selection treats both kinds alike.
    pub fn from_rows(side: Side, rows: Vec<Row>) -> Self {
        let size = rows.iter().map(Row::encoded_len).sum();
        Self {
            side,
            size,
            source: TableSource::Rows(rows),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    /// Read a file-backed table line by line into memory. No-op for tables
    /// that already hold rows.
    pub fn materialize(&mut self) -> JoinResult<()> {
        let rows = match &self.source {
            TableSource::Rows(_) => return Ok(()),
            TableSource::File { file, path } => {
                log::debug!("Sequentially reading {} from {:?}", self.side, path);
                read_rows(file)?
            }
        };
        self.source = TableSource::Rows(rows);
        Ok(())
    }
}

fn read_rows(file: &File) -> JoinResult<Vec<Row>> {
    let mut reader = BufReader::new(file);
    let mut rows = Vec::new();
    let mut line = Vec::new();
    let mut offset = 0u64;

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(rows);
        }
        let record = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        match parse_record(record) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {}
            Err(reason) => {
                return Err(JoinError::Parse {
                    offset,
                    reason: reason.to_string(),
                })
            }
        }
        offset += n as u64;
    }
}
