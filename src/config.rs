//! Join configuration.

use crate::error::{JoinError, JoinResult};
use crate::relation::Side;

/// Default degree of parallelism.
pub const DEFAULT_PARTITIONS: usize = 4;
/// Default capacity of each scanner's row stream.
pub const DEFAULT_ROW_CHANNEL_CAPACITY: usize = 1024;
/// Default capacity of each probe worker's match stream.
pub const DEFAULT_MATCH_CHANNEL_CAPACITY: usize = 15;
/// Default block size for partition reads.
pub const DEFAULT_READ_BLOCK_SIZE: usize = 64 * 1024;
/// Upper bound on the degree of parallelism. Each partition runs up to three
/// threads per stage.
pub const MAX_PARTITIONS: usize = 8192;

/// Logical inequality on the `b` columns, stated in terms of the physical
/// relations so that it does not depend on which side builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPredicate {
    /// relation1.b > relation2.b
    #[default]
    LeftGreater,
    /// relation2.b > relation1.b
    RightGreater,
}

impl FilterPredicate {
    /// The comparison probe workers evaluate when `build` is the build side.
    pub fn oriented(self, build: Side) -> ProbeComparison {
        match (self, build) {
            (FilterPredicate::LeftGreater, Side::Left) => ProbeComparison::BuildGreater,
            (FilterPredicate::LeftGreater, Side::Right) => ProbeComparison::ProbeGreater,
            (FilterPredicate::RightGreater, Side::Left) => ProbeComparison::ProbeGreater,
            (FilterPredicate::RightGreater, Side::Right) => ProbeComparison::BuildGreater,
        }
    }
}

/// Strict inequality between a probe row's `b` and a stored build value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeComparison {
    /// probe.b > build.b
    ProbeGreater,
    /// build.b > probe.b
    BuildGreater,
}

impl ProbeComparison {
    #[inline]
    pub fn matches(self, probe_b: i64, build_b: i64) -> bool {
        match self {
            ProbeComparison::ProbeGreater => probe_b > build_b,
            ProbeComparison::BuildGreater => build_b > probe_b,
        }
    }
}

/// Which relation feeds the hash table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildSide {
    /// The smaller relation by byte size; relation1 on ties.
    #[default]
    Auto,
    Left,
    Right,
}

impl BuildSide {
    pub fn resolve(self, left_size: u64, right_size: u64) -> Side {
        match self {
            BuildSide::Auto if right_size < left_size => Side::Right,
            BuildSide::Auto => Side::Left,
            BuildSide::Left => Side::Left,
            BuildSide::Right => Side::Right,
        }
    }
}

/// How relation files are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Concurrent record-aligned byte-range scans.
    #[default]
    Partitioned,
    /// Read each file line by line first, then split rows by index range.
    Sequential,
}

/// Parameters of one join invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    pub partitions: usize,
    pub row_channel_capacity: usize,
    pub match_channel_capacity: usize,
    pub read_block_size: usize,
    pub build_side: BuildSide,
    pub predicate: FilterPredicate,
    pub scan_mode: ScanMode,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            partitions: DEFAULT_PARTITIONS,
            row_channel_capacity: DEFAULT_ROW_CHANNEL_CAPACITY,
            match_channel_capacity: DEFAULT_MATCH_CHANNEL_CAPACITY,
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
            build_side: BuildSide::default(),
            predicate: FilterPredicate::default(),
            scan_mode: ScanMode::default(),
        }
    }
}

impl JoinConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_row_channel_capacity(mut self, capacity: usize) -> Self {
        self.row_channel_capacity = capacity;
        self
    }

    pub fn with_match_channel_capacity(mut self, capacity: usize) -> Self {
        self.match_channel_capacity = capacity;
        self
    }

    pub fn with_read_block_size(mut self, size: usize) -> Self {
        self.read_block_size = size;
        self
    }

    pub fn with_build_side(mut self, build_side: BuildSide) -> Self {
        self.build_side = build_side;
        self
    }

    pub fn with_predicate(mut self, predicate: FilterPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn validate(&self) -> JoinResult<()> {
        let checks = [
            ("partitions", self.partitions),
            ("row_channel_capacity", self.row_channel_capacity),
            ("match_channel_capacity", self.match_channel_capacity),
            ("read_block_size", self.read_block_size),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(JoinError::InvalidConfig(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        if self.partitions > MAX_PARTITIONS {
            return Err(JoinError::InvalidConfig(format!(
                "partitions must be at most {}, got {}",
                MAX_PARTITIONS, self.partitions
            )));
        }
        Ok(())
    }
}
