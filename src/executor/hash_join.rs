//! Partitioned parallel hash join executor.
//!
//! Algorithm:
//! 1. Pick the build side (smaller relation by default)
//! 2. Build phase: P workers insert the build relation into a
//!    [`PartitionedHashTable`], fed by P record-aligned scanners or by P index
//!    ranges of materialized rows
//! 3. Barrier: every build worker is joined, then the table is frozen
//! 4. Probe phase: P workers probe the frozen table with the other relation,
//!    each emitting match signals on its own bounded stream
//! 5. Aggregation: one partial counter per stream, summed by a counted reducer

use crate::concurrency::CancellationToken;
use crate::config::{JoinConfig, ProbeComparison, ScanMode};
use crate::error::{JoinError, JoinResult};
use crate::executor::aggregate;
use crate::executor::build;
use crate::executor::probe::{ProbeReport, ProbeWorker};
use crate::executor::worker::{record_error, WorkerGroup};
use crate::hash_table::{FrozenHashTable, PartitionedHashTable};
use crate::relation::{Row, Side, Table, TableSource};
use crate::scan::{partition_ranges, scan_partition};
use crossbeam_channel::{bounded, Receiver};
use log::{debug, info};
use std::thread::{self, Scope};
use std::time::{Duration, Instant};

/// Rows of one partition, either borrowed from a materialized table or
/// streamed from a scanner thread.
enum PartitionInput<'a> {
    Rows(&'a [Row]),
    Stream(Receiver<Row>),
}

/// Summary of one join execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStats {
    pub build_side: Side,
    pub comparison: ProbeComparison,
    pub partitions: usize,
    pub build_rows: u64,
    pub probe_rows: u64,
    pub distinct_keys: usize,
    pub races_lost: u64,
    /// Per probe partition, in partition order.
    pub partial_counts: Vec<u64>,
    pub build_elapsed: Duration,
    pub probe_elapsed: Duration,
}

/// Result of a join: the match count plus execution statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub count: u64,
    pub stats: JoinStats,
}

struct ProbeStageReport {
    count: u64,
    rows: u64,
    partial_counts: Vec<u64>,
}

/// Executes equi-join plus inequality filter counts over two relations.
#[derive(Debug, Clone)]
pub struct HashJoinExecutor {
    config: JoinConfig,
}

impl HashJoinExecutor {
    pub fn new(config: JoinConfig) -> JoinResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Join relation1 (`left`) with relation2 (`right`).
    ///
    /// Both tables are borrowed mutably for the whole join so that no other
    /// join can use them concurrently.
    pub fn execute(&self, left: &mut Table, right: &mut Table) -> JoinResult<JoinOutcome> {
        self.execute_with_token(left, right, &CancellationToken::new())
    }

    /// Like [`execute`](Self::execute), but stops early once `token` is
    /// cancelled from outside.
    pub fn execute_with_token(
        &self,
        left: &mut Table,
        right: &mut Table,
        token: &CancellationToken,
    ) -> JoinResult<JoinOutcome> {
        if left.side() != Side::Left || right.side() != Side::Right {
            return Err(JoinError::InvalidConfig(format!(
                "expected relation1 and relation2, got {} and {}",
                left.side(),
                right.side()
            )));
        }

        if self.config.scan_mode == ScanMode::Sequential {
            left.materialize()?;
            right.materialize()?;
        }
        token.check()?;

        let (left_size, right_size) = (left.size(), right.size());
        let build_side = self.config.build_side.resolve(left_size, right_size);
        let (build_table, probe_table) = match build_side {
            Side::Left => (&*left, &*right),
            Side::Right => (&*right, &*left),
        };
        let comparison = self.config.predicate.oriented(build_side);
        info!(
            "Joining {} ({} bytes) with {} ({} bytes): {} builds, {} partitions, {:?}",
            Side::Left,
            left_size,
            Side::Right,
            right_size,
            build_side,
            self.config.partitions,
            comparison
        );

        let started = Instant::now();
        let hash_table = PartitionedHashTable::new();
        let build_rows = self.build_stage(build_table, &hash_table, token)?;
        let distinct_keys = hash_table.len();
        let races_lost = hash_table.races_lost();
        let frozen = hash_table.freeze();
        let build_elapsed = started.elapsed();
        info!(
            "Build stage: {} rows, {} keys, {} first-insert races lost, {:?}",
            build_rows, distinct_keys, races_lost, build_elapsed
        );

        let started = Instant::now();
        let probe = self.probe_stage(probe_table, &frozen, comparison, token)?;
        let probe_elapsed = started.elapsed();
        info!(
            "Probe stage: {} rows, {} matches, {:?}",
            probe.rows, probe.count, probe_elapsed
        );

        Ok(JoinOutcome {
            count: probe.count,
            stats: JoinStats {
                build_side,
                comparison,
                partitions: self.config.partitions,
                build_rows,
                probe_rows: probe.rows,
                distinct_keys,
                races_lost,
                partial_counts: probe.partial_counts,
                build_elapsed,
                probe_elapsed,
            },
        })
    }

    /// Start one scanner per record-aligned byte range, or slice the
    /// materialized rows into index ranges.
    fn open_inputs<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        table: &'env Table,
        scanners: &mut WorkerGroup<'scope, u64>,
        token: &'env CancellationToken,
    ) -> JoinResult<Vec<PartitionInput<'env>>> {
        let (file, path) = match table.source() {
            TableSource::Rows(rows) => {
                return Ok(split_rows(rows, self.config.partitions)
                    .map(PartitionInput::Rows)
                    .collect());
            }
            TableSource::File { file, path } => (file, path),
        };

        let ranges = partition_ranges(file, table.size(), self.config.partitions)?;
        debug!("Partitioned {:?} into {:?}", path, ranges);

        let block_size = self.config.read_block_size;
        let inputs = ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let (tx, rx) = bounded(self.config.row_channel_capacity);
                scanners.spawn(
                    scope,
                    format!("scan-{}-{}", table.side(), i),
                    token,
                    move || scan_partition(file, range, block_size, &tx, token),
                );
                PartitionInput::Stream(rx)
            })
            .collect();
        Ok(inputs)
    }

    fn build_stage(
        &self,
        table: &Table,
        hash_table: &PartitionedHashTable,
        token: &CancellationToken,
    ) -> JoinResult<u64> {
        thread::scope(|s| {
            let mut scanners = WorkerGroup::new();
            let inputs = self.open_inputs(s, table, &mut scanners, token)?;

            let mut builders = WorkerGroup::new();
            for (i, input) in inputs.into_iter().enumerate() {
                builders.spawn(s, format!("build-{}", i), token, move || match input {
                    PartitionInput::Rows(rows) => build::insert_rows(hash_table, rows, token),
                    PartitionInput::Stream(rx) => build::insert_stream(hash_table, rx, token),
                });
            }

            let (_, mut failure) = scanners.join();
            let (inserted, build_failure) = builders.join();
            if let Some(e) = build_failure {
                record_error(&mut failure, e);
            }
            match failure {
                Some(e) => Err(e),
                None => Ok(inserted.iter().sum()),
            }
        })
    }

    fn probe_stage(
        &self,
        table: &Table,
        hash_table: &FrozenHashTable,
        comparison: ProbeComparison,
        token: &CancellationToken,
    ) -> JoinResult<ProbeStageReport> {
        thread::scope(|s| {
            let mut scanners = WorkerGroup::new();
            let inputs = self.open_inputs(s, table, &mut scanners, token)?;
            let streams = inputs.len();
            let (results_tx, results_rx) = bounded::<u64>(streams.max(1));

            let mut probers = WorkerGroup::new();
            let mut counters = WorkerGroup::new();
            for (i, input) in inputs.into_iter().enumerate() {
                let (match_tx, match_rx) = bounded(self.config.match_channel_capacity);
                probers.spawn(s, format!("probe-{}", i), token, move || {
                    let worker = ProbeWorker::new(hash_table, comparison, match_tx, token);
                    match input {
                        PartitionInput::Rows(rows) => worker.run_rows(rows),
                        PartitionInput::Stream(rx) => worker.run_stream(rx),
                    }
                });

                let results_tx = results_tx.clone();
                counters.spawn(s, format!("count-{}", i), token, move || {
                    aggregate::count_matches(match_rx, results_tx)
                });
            }
            drop(results_tx);

            let reduced = aggregate::reduce(&results_rx, streams, token);

            let (_, mut failure) = scanners.join();
            let (reports, probe_failure) = probers.join();
            let (partial_counts, count_failure) = counters.join();
            for e in [probe_failure, count_failure].into_iter().flatten() {
                record_error(&mut failure, e);
            }
            let count = match reduced {
                Ok(count) => count,
                Err(e) => {
                    record_error(&mut failure, e);
                    0
                }
            };
            if let Some(e) = failure {
                return Err(e);
            }

            debug_assert_eq!(
                count,
                reports.iter().map(|r: &ProbeReport| r.matches).sum::<u64>()
            );
            Ok(ProbeStageReport {
                count,
                rows: reports.iter().map(|r| r.rows).sum(),
                partial_counts,
            })
        })
    }
}

/// Split `rows` into `parts` contiguous index ranges whose lengths differ by
/// at most one, longer ranges first.
fn split_rows(rows: &[Row], parts: usize) -> impl Iterator<Item = &[Row]> + '_ {
    let (quotient, remainder) = (rows.len() / parts, rows.len() % parts);
    let start = move |k: usize| quotient * k + k.min(remainder);
    (0..parts).map(move |k| &rows[start(k)..start(k + 1)])
}
