//! Finalize envelope and batch summaries

use crate::PipelineError;
use jobpulse_domain::{BackendInfo, BackendKind, JobId, QcVerdict, RunId, StructuredRecord, TraceEvent};
use jobpulse_extractor::ExtractionResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// How a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// QC passed and a report was generated
    Reported,

    /// QC passed but report generation failed
    ReportFailed,

    /// QC passed and no reporter is configured
    Passed,

    /// QC failed on the last permitted attempt
    QcFailed,
}

impl JobOutcome {
    /// Get the outcome name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Reported => "reported",
            JobOutcome::ReportFailed => "report_failed",
            JobOutcome::Passed => "passed",
            JobOutcome::QcFailed => "qc_failed",
        }
    }

    /// Whether a validated record was produced
    pub fn has_record(&self) -> bool {
        !matches!(self, JobOutcome::QcFailed)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extraction attempt, condensed for the output envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    /// Which slot of the fallback pair ran
    pub slot: BackendKind,

    /// Backend that served the attempt
    pub backend: BackendInfo,

    /// Error identifier, `None` on success
    pub error_kind: Option<String>,

    /// Finer-grained error reason (e.g. `timeout`, `no_object_found`)
    pub sub_reason: Option<String>,

    /// Length of the raw completion in bytes
    pub raw_chars: usize,

    /// Whether the salvage parser had to repair the completion
    pub repaired: bool,

    /// Wall time of the attempt
    pub elapsed_ms: u64,
}

impl AttemptSummary {
    /// Summarize an extraction result
    pub fn from_result(slot: BackendKind, result: &ExtractionResult) -> Self {
        Self {
            slot,
            backend: result.backend().clone(),
            error_kind: result.error().map(|e| e.kind().to_string()),
            sub_reason: result
                .error()
                .and_then(|e| e.sub_reason())
                .map(str::to_string),
            raw_chars: result.raw_output().len(),
            repaired: result.repaired(),
            elapsed_ms: result.elapsed_ms(),
        }
    }

    /// Whether the attempt yielded a record
    pub fn succeeded(&self) -> bool {
        self.error_kind.is_none()
    }
}

/// Everything a finished job hands to persistence and back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Job identifier
    pub job_id: JobId,

    /// Identifier of this run
    pub run_id: RunId,

    /// Validated record; present only when the final verdict passed
    pub record: Option<StructuredRecord>,

    /// Final QC verdict
    pub verdict: Option<QcVerdict>,

    /// Markdown report
    pub report: Option<String>,

    /// How the job ended
    pub outcome: JobOutcome,

    /// Whether the API fallback was taken
    pub used_fallback: bool,

    /// Fetch metadata (path, length, digest)
    #[serde(default)]
    pub origin: Map<String, Value>,

    /// Extraction attempts in order
    pub attempts: Vec<AttemptSummary>,

    /// Execution trace
    pub trace: Vec<TraceEvent>,
}

/// Aggregate counts over a batch of runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Jobs submitted
    pub total: usize,

    /// Jobs that ended with a report
    pub reported: usize,

    /// Jobs whose report failed
    pub report_failed: usize,

    /// Jobs that passed QC without a reporter
    pub passed: usize,

    /// Jobs that failed QC
    pub qc_failed: usize,

    /// Jobs that returned an error (fetch failure or lost task)
    pub errored: usize,

    /// Jobs that fell back to the API backend
    pub fallbacks: usize,
}

impl BatchSummary {
    /// Count outcomes over batch results
    pub fn from_results(results: &[(JobId, Result<JobOutput, PipelineError>)]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for (_, result) in results {
            match result {
                Ok(output) => {
                    match output.outcome {
                        JobOutcome::Reported => summary.reported += 1,
                        JobOutcome::ReportFailed => summary.report_failed += 1,
                        JobOutcome::Passed => summary.passed += 1,
                        JobOutcome::QcFailed => summary.qc_failed += 1,
                    }
                    if output.used_fallback {
                        summary.fallbacks += 1;
                    }
                }
                Err(_) => summary.errored += 1,
            }
        }
        summary
    }

    /// Jobs that produced a validated record
    pub fn succeeded(&self) -> usize {
        self.reported + self.report_failed + self.passed
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} jobs: {} reported, {} report failed, {} passed, {} qc failed, {} errored ({} fallbacks)",
            self.total,
            self.reported,
            self.report_failed,
            self.passed,
            self.qc_failed,
            self.errored,
            self.fallbacks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchError;
    use jobpulse_extractor::{BackendFailure, ExtractionError};

    fn output(outcome: JobOutcome, used_fallback: bool) -> JobOutput {
        JobOutput {
            job_id: JobId::new("1"),
            run_id: RunId::new(),
            record: None,
            verdict: None,
            report: None,
            outcome,
            used_fallback,
            origin: Map::new(),
            attempts: Vec::new(),
            trace: Vec::new(),
        }
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&JobOutcome::ReportFailed).unwrap();
        assert_eq!(json, "\"report_failed\"");
        assert!(!JobOutcome::QcFailed.has_record());
        assert!(JobOutcome::Passed.has_record());
    }

    #[test]
    fn test_attempt_summary_from_failure() {
        let backend = BackendInfo::new(BackendKind::Local, "mock", "m");
        let result = ExtractionResult::failure(
            ExtractionError::Backend(BackendFailure::Timeout(5)),
            String::new(),
            backend.clone(),
            5000,
        );
        let summary = AttemptSummary::from_result(BackendKind::Local, &result);

        assert!(!summary.succeeded());
        assert_eq!(summary.error_kind.as_deref(), Some("backend_failure"));
        assert_eq!(summary.sub_reason.as_deref(), Some("timeout"));
        assert_eq!(summary.backend, backend);
        assert_eq!(summary.raw_chars, 0);
    }

    #[test]
    fn test_batch_summary_counts() {
        let results = vec![
            (JobId::new("a"), Ok(output(JobOutcome::Reported, false))),
            (JobId::new("b"), Ok(output(JobOutcome::QcFailed, true))),
            (JobId::new("c"), Ok(output(JobOutcome::Reported, true))),
            (
                JobId::new("d"),
                Err(PipelineError::Fetch {
                    job_id: JobId::new("d"),
                    source: FetchError::Empty(JobId::new("d")),
                    trace: Vec::new(),
                }),
            ),
        ];
        let summary = BatchSummary::from_results(&results);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.reported, 2);
        assert_eq!(summary.qc_failed, 1);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.fallbacks, 2);
        assert_eq!(summary.succeeded(), 2);
        assert!(summary.summary().starts_with("4 jobs: 2 reported"));
    }
}
