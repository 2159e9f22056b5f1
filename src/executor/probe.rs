//! Probe stage: look up each probe row and emit one signal per match.

use crate::concurrency::{recv_or_cancel, send_or_cancel, CancellationToken};
use crate::config::ProbeComparison;
use crate::error::JoinResult;
use crate::hash_table::FrozenHashTable;
use crate::relation::Row;
use crossbeam_channel::{Receiver, Sender};

/// One satisfied (probe row, build value) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSignal;

/// Work done by one probe worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub rows: u64,
    pub matches: u64,
}

/// Probes one partition against the frozen hash table.
///
/// The worker owns the only sender of its match stream. The stream closes
/// when the worker is consumed by `run_rows` or `run_stream`, after its last
/// signal, whether or not anything matched.
pub struct ProbeWorker<'a> {
    table: &'a FrozenHashTable,
    comparison: ProbeComparison,
    matches: Sender<MatchSignal>,
    token: &'a CancellationToken,
    report: ProbeReport,
}

impl<'a> ProbeWorker<'a> {
    pub fn new(
        table: &'a FrozenHashTable,
        comparison: ProbeComparison,
        matches: Sender<MatchSignal>,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            table,
            comparison,
            matches,
            token,
            report: ProbeReport::default(),
        }
    }

    fn probe_row(&mut self, row: Row) -> JoinResult<()> {
        self.token.check()?;
        self.report.rows += 1;

        let table = self.table;
        let Some(values) = table.lookup(row.a) else {
            return Ok(());
        };
        for &build_b in values {
            if self.comparison.matches(row.b, build_b) {
                send_or_cancel(&self.matches, MatchSignal, self.token, "probe")?;
                self.report.matches += 1;
            }
        }
        Ok(())
    }

    /// Probe an index range of a materialized relation.
    pub fn run_rows(mut self, rows: &[Row]) -> JoinResult<ProbeReport> {
        for &row in rows {
            self.probe_row(row)?;
        }
        Ok(self.report)
    }

    /// Probe every row of a scanner's stream until the scanner hangs up.
    pub fn run_stream(mut self, rows: Receiver<Row>) -> JoinResult<ProbeReport> {
        while let Some(row) = recv_or_cancel(&rows, self.token)? {
            self.probe_row(row)?;
        }
        Ok(self.report)
    }
}
