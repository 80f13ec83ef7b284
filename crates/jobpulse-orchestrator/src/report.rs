//! Markdown report generation

use crate::ReportError;
use async_trait::async_trait;
use jobpulse_domain::{JobId, QcVerdict, StructuredRecord};
use jobpulse_llm::GenerationBackend;
use std::sync::Arc;
use tracing::{debug, warn};

/// System prompt for report backends
pub const REPORT_SYSTEM_PROMPT: &str = "You write helpful, compact markdown reports.";

/// Report text used when the backend returns an empty completion
pub const EMPTY_REPORT_NOTE: &str =
    "_The report backend returned no content for this posting._\n";

/// Per-job inputs to a report besides the record and verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    /// Job the report is for
    pub job_id: JobId,

    /// Candidate resume, if one was supplied
    pub resume_text: Option<String>,
}

impl ReportContext {
    /// Context for a job with no resume
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            resume_text: None,
        }
    }
}

/// Produces a human-readable report for a validated record
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Generate the report
    async fn generate_report(
        &self,
        record: &StructuredRecord,
        verdict: &QcVerdict,
        context: &ReportContext,
    ) -> Result<String, ReportError>;
}

/// Build the report prompt
///
/// The record and verdict are embedded as pretty-printed JSON. A missing
/// resume is passed as an empty section; the prompt tells the model to
/// state its assumptions in that case.
pub fn build_report_prompt(
    record: &StructuredRecord,
    verdict: &QcVerdict,
    resume_text: Option<&str>,
) -> Result<String, serde_json::Error> {
    let structured = serde_json::to_string_pretty(record)?;
    let qc = serde_json::to_string_pretty(verdict)?;

    Ok(format!(
        "You are a career assistant. Write a concise markdown report.\n\
         Rules:\n\
         - Base everything on STRUCTURED_JSON. Do not invent requirements.\n\
         - If RESUME_TEXT is empty, state assumptions.\n\
         Sections:\n\
         1) Job summary (title/company/location)\n\
         2) Key requirements (bullets)\n\
         3) Skill gaps (bullets)\n\
         4) 2-week action plan (bullets)\n\n\
         STRUCTURED_JSON:\n{}\n\n\
         QC:\n{}\n\n\
         RESUME_TEXT:\n{}\n",
        structured,
        qc,
        resume_text.unwrap_or("")
    ))
}

/// Reporter backed by a generation backend
///
/// The backend's own settings (temperature, token budget, system prompt)
/// apply; see `ReportConfig` for the defaults used when it is built from
/// configuration.
pub struct LlmReporter {
    backend: Arc<dyn GenerationBackend>,
}

impl LlmReporter {
    /// Create a reporter over a backend
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Reporter for LlmReporter {
    async fn generate_report(
        &self,
        record: &StructuredRecord,
        verdict: &QcVerdict,
        context: &ReportContext,
    ) -> Result<String, ReportError> {
        let prompt = build_report_prompt(record, verdict, context.resume_text.as_deref())?;
        let backend = self.backend.info();
        debug!(job_id = %context.job_id, backend = %backend, "Generating report");

        let text = self.backend.generate(&prompt).await?;
        if text.trim().is_empty() {
            warn!(job_id = %context.job_id, backend = %backend, "Report backend returned empty content");
            return Ok(EMPTY_REPORT_NOTE.to_string());
        }
        Ok(text)
    }
}
