//! Parallel scan of relation files.
//!
//! - **partitioner**: record-aligned byte ranges and positional reads
//! - **reader**: block-wise parsing of one range into a bounded row stream

pub mod partitioner;
pub mod reader;

pub use partitioner::{partition_ranges, read_exact_at, resolve_boundary, ByteRange};
pub use reader::{scan_partition, scan_range};
