//! Pipeline stages, per-run state, and the transition function

use crate::fetch::FetchedPosting;
use crate::output::AttemptSummary;
use jobpulse_domain::{BackendKind, JobId, QcVerdict, RunId, TraceLog};
use jobpulse_extractor::ExtractionResult;
use std::fmt;

/// A job submitted to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Job identifier
    pub job_id: JobId,

    /// Hint passed to the fetcher (e.g. the job board name)
    pub source_hint: Option<String>,

    /// Candidate resume for the report's skill-gap section
    pub resume_text: Option<String>,
}

impl JobRequest {
    /// Create a request with no source hint or resume
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            source_hint: None,
            resume_text: None,
        }
    }

    /// Set the source hint
    pub fn with_source_hint(mut self, hint: impl Into<String>) -> Self {
        self.source_hint = Some(hint.into());
        self
    }

    /// Attach resume text for the report
    pub fn with_resume(mut self, resume_text: impl Into<String>) -> Self {
        self.resume_text = Some(resume_text.into());
        self
    }
}

/// A pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Acquire the posting text
    Fetch,

    /// Run one extraction attempt on the given backend slot
    Extract(BackendKind),

    /// Evaluate the current extraction
    Qc,

    /// Generate the markdown report
    Report,

    /// Assemble and persist the output
    Finalize,

    /// Terminal
    Done,
}

impl Stage {
    /// Step name used in trace events
    pub fn step_name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Extract(BackendKind::Local) => "extract_local",
            Stage::Extract(BackendKind::Api) => "extract_api",
            Stage::Qc => "qc",
            Stage::Report => "report",
            Stage::Finalize => "finalize",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.step_name())
    }
}

/// Mutable state of one run, owned by the task executing it
#[derive(Debug)]
pub struct RunState {
    /// Job identifier
    pub job_id: JobId,

    /// Identifier of this run
    pub run_id: RunId,

    /// Source hint for the fetcher
    pub source_hint: Option<String>,

    /// Resume text for the report
    pub resume_text: Option<String>,

    /// Backend slot tried first
    pub initial_backend: BackendKind,

    /// Fetched posting
    pub posting: Option<FetchedPosting>,

    /// Most recent extraction attempt
    pub extraction: Option<ExtractionResult>,

    /// Verdict on the most recent extraction
    pub verdict: Option<QcVerdict>,

    /// Generated report
    pub report: Option<String>,

    /// Why report generation failed
    pub report_error: Option<String>,

    /// Set once the API fallback has been taken
    pub used_fallback: bool,

    /// Every extraction attempt, in order
    pub attempts: Vec<AttemptSummary>,

    /// Execution trace
    pub trace: TraceLog,
}

impl RunState {
    /// Fresh state for a job
    pub fn new(job: JobRequest, initial_backend: BackendKind) -> Self {
        Self {
            job_id: job.job_id,
            run_id: RunId::new(),
            source_hint: job.source_hint,
            resume_text: job.resume_text,
            initial_backend,
            posting: None,
            extraction: None,
            verdict: None,
            report: None,
            report_error: None,
            used_fallback: false,
            attempts: Vec::new(),
            trace: TraceLog::new(),
        }
    }

    /// Slot of the most recent extraction attempt
    pub fn last_slot(&self) -> Option<BackendKind> {
        self.attempts.last().map(|a| a.slot)
    }

    /// Whether the current verdict passed
    pub fn qc_passed(&self) -> bool {
        self.verdict.as_ref().is_some_and(QcVerdict::is_pass)
    }

    /// Fetched posting text, empty before the fetch completes
    pub fn posting_text(&self) -> &str {
        self.posting.as_ref().map_or("", |p| p.text.as_str())
    }
}

/// Decide the stage that follows `stage`
///
/// Pure: reads the state, never changes it. The runner sets
/// `used_fallback` when it follows a `Qc -> Extract(Api)` edge.
pub fn next_stage(stage: &Stage, state: &RunState) -> Stage {
    match stage {
        Stage::Fetch => Stage::Extract(state.initial_backend),
        Stage::Extract(_) => Stage::Qc,
        Stage::Qc => {
            if state.qc_passed() {
                Stage::Report
            } else if state.used_fallback || state.last_slot() != Some(BackendKind::Local) {
                Stage::Finalize
            } else {
                Stage::Extract(BackendKind::Api)
            }
        }
        Stage::Report => Stage::Finalize,
        Stage::Finalize | Stage::Done => Stage::Done,
    }
}
