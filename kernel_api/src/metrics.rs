//! Scheduling metrics reports

use crate::policy::SchedulingPolicy;
use core_types::{EpochId, Pid};
use serde::{Deserialize, Serialize};

/// Per-process metrics row
///
/// All values are in clock ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetricsRow {
    pub pid: Pid,
    pub program: String,
    pub arrival: u64,
    pub completion: u64,
    pub turnaround: u64,
    pub waiting: u64,
    pub response: Option<u64>,
    pub page_faults: u64,
}

/// Metrics for one scheduling epoch
///
/// An epoch is one drain of the job queue: every process scheduled since
/// the previous epoch, run until the ready and I/O queues are empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub epoch: EpochId,
    pub policy: SchedulingPolicy,
    pub started_at: u64,
    pub finished_at: u64,
    /// Processes retired through normal termination during the epoch
    pub completed: usize,
    /// Completed processes per tick of epoch duration
    pub throughput: f64,
    pub mean_waiting: f64,
    pub mean_turnaround: f64,
    pub mean_response: f64,
    pub rows: Vec<ProcessMetricsRow>,
}

impl MetricsReport {
    /// Builds a report, deriving throughput and means from the rows
    ///
    /// Throughput is zero for an empty epoch span. Means over zero rows are
    /// zero; the mean response ignores rows that never reached the CPU.
    pub fn from_rows(
        policy: SchedulingPolicy,
        started_at: u64,
        finished_at: u64,
        rows: Vec<ProcessMetricsRow>,
    ) -> Self {
        let completed = rows.len();
        let span = finished_at.saturating_sub(started_at);
        let throughput = if span == 0 {
            0.0
        } else {
            completed as f64 / span as f64
        };

        let mean_waiting = mean(rows.iter().map(|row| row.waiting));
        let mean_turnaround = mean(rows.iter().map(|row| row.turnaround));
        let mean_response = mean(rows.iter().filter_map(|row| row.response));

        Self {
            epoch: EpochId::new(),
            policy,
            started_at,
            finished_at,
            completed,
            throughput,
            mean_waiting,
            mean_turnaround,
            mean_response,
            rows,
        }
    }
}

fn mean(values: impl Iterator<Item = u64>) -> f64 {
    let (sum, count) = values.fold((0u64, 0u64), |(sum, count), value| {
        (sum.saturating_add(value), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Receives one report per scheduling epoch
pub trait MetricsSink {
    fn record(&mut self, report: &MetricsReport);
}

impl MetricsSink for Vec<MetricsReport> {
    fn record(&mut self, report: &MetricsReport) {
        self.push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: u32, waiting: u64, turnaround: u64, response: Option<u64>) -> ProcessMetricsRow {
        ProcessMetricsRow {
            pid: Pid::new(pid),
            program: format!("prog{}", pid),
            arrival: 0,
            completion: turnaround,
            turnaround,
            waiting,
            response,
            page_faults: 0,
        }
    }

    #[test]
    fn test_report_aggregates() {
        let report = MetricsReport::from_rows(
            SchedulingPolicy::Fcfs,
            0,
            10,
            vec![row(1, 0, 4, Some(0)), row(2, 4, 10, Some(4))],
        );
        assert_eq!(report.completed, 2);
        assert!((report.throughput - 0.2).abs() < f64::EPSILON);
        assert!((report.mean_waiting - 2.0).abs() < f64::EPSILON);
        assert!((report.mean_turnaround - 7.0).abs() < f64::EPSILON);
        assert!((report.mean_response - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_span_has_zero_throughput() {
        let report = MetricsReport::from_rows(SchedulingPolicy::Fcfs, 5, 5, Vec::new());
        assert_eq!(report.throughput, 0.0);
        assert_eq!(report.mean_waiting, 0.0);
    }

    #[test]
    fn test_vec_sink_collects_reports() {
        let mut sink: Vec<MetricsReport> = Vec::new();
        let report = MetricsReport::from_rows(SchedulingPolicy::Fcfs, 0, 1, Vec::new());
        sink.record(&report);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].epoch, report.epoch);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = MetricsReport::from_rows(
            SchedulingPolicy::RoundRobin { quantum: 2 },
            0,
            4,
            vec![row(1, 1, 4, Some(1))],
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"RoundRobin\""));
        let back: MetricsReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
