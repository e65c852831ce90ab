//! Sequential validation of every loaded bid record.
//!
//! Rows are validated one at a time in input order. Each verdict's resolved
//! URL is written back into its record, and only passing records are kept.

use chrono::Local;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::logger::RunLogger;
use crate::platform::{Platform, Verdict};
use crate::records::BidRecord;
use crate::validator::LinkValidator;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlatformCounts {
    pub passed: usize,
    pub failed: usize,
}

/// Summary of a validation run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Rows that reached validation
    pub input_rows: usize,
    /// Rows dropped before validation for a missing URL or platform
    pub dropped_rows: usize,
    pub passed: usize,
    pub failed: usize,
    pub render_timeouts: usize,
    pub per_platform: BTreeMap<Platform, PlatformCounts>,
    pub duration_secs: f64,
    pub started_at: String,
    pub completed_at: String,
}

impl BatchSummary {
    fn new(input_rows: usize, dropped_rows: usize) -> Self {
        Self {
            input_rows,
            dropped_rows,
            passed: 0,
            failed: 0,
            render_timeouts: 0,
            per_platform: BTreeMap::new(),
            duration_secs: 0.0,
            started_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            completed_at: String::new(),
        }
    }

    fn record(&mut self, verdict: &Verdict) {
        let counts = self.per_platform.entry(verdict.platform).or_default();
        if verdict.passed {
            self.passed += 1;
            counts.passed += 1;
        } else {
            self.failed += 1;
            counts.failed += 1;
        }
        if verdict.render_timed_out {
            self.render_timeouts += 1;
        }
    }
}

pub struct BatchOutcome {
    /// Passing records, in input order, with their URL replaced by the resolved URL
    pub retained: Vec<BidRecord>,
    /// One verdict per validated record, in input order
    pub verdicts: Vec<Verdict>,
    pub summary: BatchSummary,
}

/// Validate every record in order and keep the ones that pass.
pub async fn run_batch(
    validator: &LinkValidator,
    records: Vec<BidRecord>,
    dropped_rows: usize,
    logger: &RunLogger,
) -> BatchOutcome {
    let started = Instant::now();
    let total = records.len();
    let mut summary = BatchSummary::new(total, dropped_rows);
    let mut retained = Vec::new();
    let mut verdicts = Vec::with_capacity(total);

    for (i, mut record) in records.into_iter().enumerate() {
        let index = i + 1;
        let platform = Platform::from_label(&record.platform);
        logger.log_row_start(index, total, platform, &record.url);

        let verdict = validator.validate(&record.url, &record.platform).await;
        logger.log_row_verdict(index, &verdict);
        logger.advance_progress(&format!("row {}", index));

        record.url = verdict.resolved_url.clone();
        summary.record(&verdict);
        if verdict.passed {
            retained.push(record);
        }
        verdicts.push(verdict);
    }

    summary.duration_secs = started.elapsed().as_secs_f64();
    summary.completed_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    BatchOutcome {
        retained,
        verdicts,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ValidationFailure;

    #[test]
    fn test_summary_counts_by_platform() {
        let mut summary = BatchSummary::new(4, 1);
        summary.record(&Verdict::pass(Platform::Bonfire, "a"));
        summary.record(&Verdict::fail(Platform::Bonfire, "b", ValidationFailure::Render("x".into())));
        summary.record(
            &Verdict::fail(Platform::DemandStar, "c", ValidationFailure::MissingHeading).with_render_timeout(true),
        );
        summary.record(&Verdict::pass(Platform::Generic, "d"));

        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.render_timeouts, 1);
        assert_eq!(
            summary.per_platform.get(&Platform::Bonfire),
            Some(&PlatformCounts { passed: 1, failed: 1 })
        );
        assert_eq!(summary.per_platform.get(&Platform::IonWave), None);
    }
}
