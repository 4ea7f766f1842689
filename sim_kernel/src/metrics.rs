//! Epoch metrics: aggregation and sinks

use crate::pcb::Pcb;
use kernel_api::{MetricsReport, MetricsSink, ProcessMetricsRow, SchedulingPolicy};
use std::io::Write;

/// Builds the metrics row of a process that finished with metrics
///
/// Abandoned, rejected and still-running processes have no row.
pub fn process_row(pcb: &Pcb) -> Option<ProcessMetricsRow> {
    if !pcb.exit_reason()?.finalizes_metrics() {
        return None;
    }
    let completion = pcb.completion()?;
    Some(ProcessMetricsRow {
        pid: pcb.pid(),
        program: pcb.program().to_string(),
        arrival: pcb.arrival(),
        completion,
        turnaround: completion - pcb.arrival(),
        waiting: pcb.waiting(),
        response: pcb.response(),
        page_faults: pcb.page_faults(),
    })
}

/// Aggregates the rows of `members` into one epoch report
pub fn epoch_report<'a>(
    policy: SchedulingPolicy,
    started_at: u64,
    finished_at: u64,
    members: impl IntoIterator<Item = &'a Pcb>,
) -> MetricsReport {
    let rows = members.into_iter().filter_map(process_row).collect();
    MetricsReport::from_rows(policy, started_at, finished_at, rows)
}

/// Every report recorded, oldest first
#[derive(Debug, Clone, Default)]
pub struct MetricsHistory {
    reports: Vec<MetricsReport>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[MetricsReport] {
        &self.reports
    }

    pub fn latest(&self) -> Option<&MetricsReport> {
        self.reports.last()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl MetricsSink for MetricsHistory {
    fn record(&mut self, report: &MetricsReport) {
        self.reports.push(report.clone());
    }
}

/// Writes each report as one line of JSON
///
/// Write failures are counted rather than propagated; the simulation never
/// stops because a metrics consumer went away.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    failures: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failures: 0,
        }
    }

    /// Reports that could not be written
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, report: &MetricsReport) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> MetricsSink for JsonLinesSink<W> {
    fn record(&mut self, report: &MetricsReport) {
        if self.write_line(report).is_err() {
            self.failures += 1;
        }
    }
}
