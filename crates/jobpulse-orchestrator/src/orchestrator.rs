//! The pipeline runner

use crate::config::PipelineConfig;
use crate::fetch::{DirFetcher, Fetcher};
use crate::output::{AttemptSummary, BatchSummary, JobOutcome, JobOutput};
use crate::report::{LlmReporter, ReportContext, Reporter};
use crate::sink::{ArtifactSink, DirArtifactSink, NullSink};
use crate::state::{next_stage, JobRequest, RunState, Stage};
use crate::{FetchError, PipelineError, ReportError};
use jobpulse_domain::{BackendKind, JobId, SchemaContract, TraceStatus};
use jobpulse_extractor::{ExtractorConfig, ExtractorContract};
use jobpulse_gatekeeper::QualityGate;
use jobpulse_llm::GenerationBackend;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Trace step recorded around the hand-off to the artifact sink
pub const PERSIST_STEP: &str = "persist";

/// Sequences fetch, extraction, QC, fallback, report and finalize for jobs
///
/// All collaborators are shared immutable handles, so an orchestrator is
/// cheap to clone and every job runs with its own [`RunState`].
///
/// # Examples
///
/// ```
/// use jobpulse_orchestrator::{JobOutcome, JobRequest, Orchestrator};
/// # use jobpulse_orchestrator::{FetchError, FetchedPosting, Fetcher};
/// # use jobpulse_domain::{BackendKind, JobId};
/// # use jobpulse_llm::MockProvider;
/// # use std::sync::Arc;
/// # struct Inline;
/// # #[async_trait::async_trait]
/// # impl Fetcher for Inline {
/// #     async fn fetch(&self, _: &JobId, _: Option<&str>) -> Result<FetchedPosting, FetchError> {
/// #         Ok(FetchedPosting { text: "Barista at Cafe".into(), origin: Default::default() })
/// #     }
/// # }
///
/// let api = MockProvider::new(r#"{"role_title": "Barista", "company": "Cafe",
///     "requirements": ["Latte art"], "responsibilities": ["Make coffee"]}"#)
///     .with_kind(BackendKind::Api);
/// let orchestrator = Orchestrator::new(Arc::new(Inline), Arc::new(api))
///     .with_schema(jobpulse_domain::SchemaContract::permissive());
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let output = rt.block_on(orchestrator.run(JobRequest::new("1"))).unwrap();
/// assert_eq!(output.outcome, JobOutcome::Passed);
/// assert!(output.record.is_some());
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    local: Option<Arc<dyn GenerationBackend>>,
    api: Arc<dyn GenerationBackend>,
    extractor: Arc<ExtractorSet>,
    gate: Arc<QualityGate>,
    reporter: Option<Arc<dyn Reporter>>,
    sink: Arc<dyn ArtifactSink>,
    local_first: bool,
    source_hint: Option<String>,
    batch_concurrency: usize,
}

/// Extractor contracts for both slots, rebuilt whenever a backend,
/// the schema or the extractor config changes
struct ExtractorSet {
    schema: SchemaContract,
    config: ExtractorConfig,
    local: Option<ExtractorContract>,
    api: ExtractorContract,
}

impl ExtractorSet {
    fn build(
        local: Option<&Arc<dyn GenerationBackend>>,
        api: &Arc<dyn GenerationBackend>,
        schema: SchemaContract,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            local: local.map(|backend| {
                ExtractorContract::new(Arc::clone(backend), schema.clone(), config.clone())
            }),
            api: ExtractorContract::new(Arc::clone(api), schema.clone(), config.clone()),
            schema,
            config,
        }
    }

    fn for_slot(&self, slot: BackendKind) -> &ExtractorContract {
        match slot {
            BackendKind::Local => self.local.as_ref().unwrap_or(&self.api),
            BackendKind::Api => &self.api,
        }
    }
}

impl Orchestrator {
    /// Create an API-only orchestrator with default schema, config and QC
    /// rules, no reporter, and no persistence
    pub fn new(fetcher: Arc<dyn Fetcher>, api: Arc<dyn GenerationBackend>) -> Self {
        let extractor = ExtractorSet::build(
            None,
            &api,
            SchemaContract::job_posting(),
            ExtractorConfig::default(),
        );
        Self {
            fetcher,
            local: None,
            api,
            extractor: Arc::new(extractor),
            gate: Arc::new(QualityGate::default_config()),
            reporter: None,
            sink: Arc::new(NullSink),
            local_first: false,
            source_hint: None,
            batch_concurrency: 4,
        }
    }

    /// Build every collaborator from configuration
    ///
    /// API keys are read from the process environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::from_config_with_lookup(config, |key| std::env::var(key).ok())
    }

    /// Build from configuration with a custom environment lookup
    pub fn from_config_with_lookup<F>(config: &PipelineConfig, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;

        let api = config.api.build_with(&lookup)?;
        let mut orchestrator = Self::new(Arc::new(DirFetcher::new(&config.postings_dir)), api)
            .with_extractor_config(config.extractor.clone())
            .with_gate(QualityGate::new(config.qc.clone()))
            .with_local_first(config.local_first)
            .with_batch_concurrency(config.batch_concurrency);

        if let Some(local) = &config.local {
            orchestrator = orchestrator.with_local(local.build()?);
        }
        if let Some(report) = &config.report {
            orchestrator = orchestrator.with_reporter(Arc::new(LlmReporter::new(report.build_with(&lookup)?)));
        }
        if let Some(dir) = &config.artifacts_dir {
            orchestrator = orchestrator.with_sink(Arc::new(DirArtifactSink::new(dir)));
        }
        if let Some(hint) = &config.source_hint {
            orchestrator = orchestrator.with_source_hint(hint.clone());
        }

        info!(
            local = orchestrator.local.is_some(),
            api = %orchestrator.api.info(),
            local_first = orchestrator.local_first,
            reporter = orchestrator.reporter.is_some(),
            "Orchestrator configured"
        );
        Ok(orchestrator)
    }

    fn rebuild_extractors(&mut self, schema: SchemaContract, config: ExtractorConfig) {
        self.extractor = Arc::new(ExtractorSet::build(self.local.as_ref(), &self.api, schema, config));
    }

    /// Add a local backend
    pub fn with_local(mut self, local: Arc<dyn GenerationBackend>) -> Self {
        self.local = Some(local);
        let (schema, config) = (self.extractor.schema.clone(), self.extractor.config.clone());
        self.rebuild_extractors(schema, config);
        self
    }

    /// Set the schema contract applied to every extraction
    pub fn with_schema(mut self, schema: SchemaContract) -> Self {
        let config = self.extractor.config.clone();
        self.rebuild_extractors(schema, config);
        self
    }

    /// Set the extractor configuration
    pub fn with_extractor_config(mut self, config: ExtractorConfig) -> Self {
        let schema = self.extractor.schema.clone();
        self.rebuild_extractors(schema, config);
        self
    }

    /// Set the quality gate
    pub fn with_gate(mut self, gate: QualityGate) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    /// Set the reporter; without one the report stage is skipped
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Set the artifact sink
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Try the local backend first when one is configured
    pub fn with_local_first(mut self, local_first: bool) -> Self {
        self.local_first = local_first;
        self
    }

    /// Default source hint for jobs that carry none
    pub fn with_source_hint(mut self, hint: impl Into<String>) -> Self {
        self.source_hint = Some(hint.into());
        self
    }

    /// Maximum jobs in flight for [`run_batch`](Self::run_batch)
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    /// Backend slot a new job starts on
    pub fn initial_backend(&self) -> BackendKind {
        if self.local_first && self.local.is_some() {
            BackendKind::Local
        } else {
            BackendKind::Api
        }
    }

    /// Run one job to completion
    ///
    /// # Errors
    ///
    /// Only a fetch failure is returned as an error. Every other failure is
    /// recorded in the trace and reflected in [`JobOutput::outcome`].
    pub async fn run(&self, job: JobRequest) -> Result<JobOutput, PipelineError> {
        self.run_with_cancel(job, CancellationToken::new()).await
    }

    /// Run one job, stopping backend calls when `cancel` fires
    ///
    /// A cancelled extraction counts as a `backend_failure`; the job still
    /// passes through QC and finalize.
    pub async fn run_with_cancel(
        &self,
        mut job: JobRequest,
        cancel: CancellationToken,
    ) -> Result<JobOutput, PipelineError> {
        if job.source_hint.is_none() {
            job.source_hint = self.source_hint.clone();
        }
        let mut state = RunState::new(job, self.initial_backend());
        info!(
            job_id = %state.job_id,
            run_id = %state.run_id,
            initial = %state.initial_backend,
            "Starting job"
        );

        let mut stage = Stage::Fetch;
        while stage != Stage::Finalize {
            match stage {
                Stage::Fetch => self.fetch(&mut state).await?,
                Stage::Extract(slot) => self.extract(&mut state, slot, &cancel).await,
                Stage::Qc => self.evaluate(&mut state),
                Stage::Report => self.report(&mut state, &cancel).await,
                Stage::Finalize | Stage::Done => break,
            }

            let next = next_stage(&stage, &state);
            if stage == Stage::Qc && next == Stage::Extract(BackendKind::Api) {
                state.used_fallback = true;
                info!(job_id = %state.job_id, "QC failed on local backend, falling back to API");
            }
            debug!(job_id = %state.job_id, from = %stage, to = %next, "Stage transition");
            stage = next;
        }

        let output = self.finalize(&mut state).await;
        debug!(job_id = %state.job_id, to = %next_stage(&Stage::Finalize, &state), "Stage transition");
        Ok(output)
    }

    /// Run independent jobs concurrently, at most `batch_concurrency` at a
    /// time
    ///
    /// Results come back in submission order. One job's failure never
    /// affects another.
    pub async fn run_batch(
        &self,
        jobs: Vec<JobRequest>,
    ) -> Vec<(JobId, Result<JobOutput, PipelineError>)> {
        self.run_batch_with_cancel(jobs, CancellationToken::new()).await
    }

    /// Run a batch; cancelling `cancel` cancels every job in it
    pub async fn run_batch_with_cancel(
        &self,
        jobs: Vec<JobRequest>,
        cancel: CancellationToken,
    ) -> Vec<(JobId, Result<JobOutput, PipelineError>)> {
        let semaphore = Arc::new(Semaphore::new(self.batch_concurrency));
        let ids: Vec<JobId> = jobs.iter().map(|job| job.job_id.clone()).collect();
        let mut slots: Vec<Option<Result<JobOutput, PipelineError>>> =
            ids.iter().map(|_| None).collect();

        info!(jobs = ids.len(), concurrency = self.batch_concurrency, "Starting batch");

        let mut set = JoinSet::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let orchestrator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let token = cancel.child_token();
            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => orchestrator.run_with_cancel(job, token).await,
                    Err(e) => Err(PipelineError::Task {
                        job_id: job.job_id,
                        message: e.to_string(),
                    }),
                };
                (index, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!("Batch task failed: {}", e),
            }
        }

        let results: Vec<_> = ids
            .into_iter()
            .zip(slots)
            .map(|(job_id, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(PipelineError::Task {
                        job_id: job_id.clone(),
                        message: "task ended without a result".to_string(),
                    })
                });
                (job_id, result)
            })
            .collect();

        info!("Batch finished: {}", BatchSummary::from_results(&results).summary());
        results
    }

    async fn fetch(&self, state: &mut RunState) -> Result<(), PipelineError> {
        let step = Stage::Fetch.step_name();
        state.trace.record(step, TraceStatus::Start, json!({ "source": state.source_hint }));

        let fetched = self
            .fetcher
            .fetch(&state.job_id, state.source_hint.as_deref())
            .await;
        let fetched = fetched.and_then(|posting| {
            if posting.text.trim().is_empty() {
                Err(FetchError::Empty(state.job_id.clone()))
            } else {
                Ok(posting)
            }
        });
        match fetched {
            Ok(posting) => {
                state.trace.record(
                    step,
                    TraceStatus::Ok,
                    json!({ "chars": posting.text.chars().count() }),
                );
                state.posting = Some(posting);
                Ok(())
            }
            Err(e) => {
                state.trace.record(
                    step,
                    TraceStatus::Fail,
                    json!({ "error_kind": "fetch_failure", "error": e.to_string() }),
                );
                error!(
                    job_id = %state.job_id,
                    run_id = %state.run_id,
                    trace = ?state.trace.snapshot(),
                    "Fetch failed: {}",
                    e
                );
                Err(PipelineError::Fetch {
                    job_id: state.job_id.clone(),
                    source: e,
                    trace: state.trace.snapshot(),
                })
            }
        }
    }

    async fn extract(&self, state: &mut RunState, slot: BackendKind, cancel: &CancellationToken) {
        let step = Stage::Extract(slot).step_name();
        let contract = self.extractor.for_slot(slot);
        state.trace.record(
            step,
            TraceStatus::Start,
            json!({ "backend": contract.backend_info(), "template": contract.template_name() }),
        );

        let result = contract.extract_posting(state.posting_text(), cancel).await;

        match (result.record(), result.error()) {
            (Some(record), _) => state.trace.record(
                step,
                TraceStatus::Ok,
                json!({
                    "fields": record.len(),
                    "parse_repaired": result.repaired(),
                    "elapsed_ms": result.elapsed_ms(),
                }),
            ),
            (None, Some(err)) => state.trace.record(
                step,
                TraceStatus::Fail,
                json!({
                    "error_kind": err.kind(),
                    "sub_reason": err.sub_reason(),
                    "error": err.to_string(),
                    "raw_chars": result.raw_output().len(),
                    "elapsed_ms": result.elapsed_ms(),
                }),
            ),
            (None, None) => state.trace.record(step, TraceStatus::Fail, json!({})),
        }

        state.attempts.push(AttemptSummary::from_result(slot, &result));
        state.extraction = Some(result);
    }

    fn evaluate(&self, state: &mut RunState) {
        let step = Stage::Qc.step_name();
        state.trace.start(step);

        let verdict = match &state.extraction {
            Some(result) => self
                .gate
                .evaluate(result.record(), result.repaired(), result.backend()),
            None => self
                .gate
                .evaluate(None, false, &self.extractor.for_slot(state.initial_backend).backend_info()),
        };

        let status = if verdict.is_pass() {
            TraceStatus::Ok
        } else {
            TraceStatus::Fail
        };
        state.trace.record(
            step,
            status,
            json!({
                "qc": verdict.status,
                "issues": verdict.issue_ids(),
                "missing_or_empty": verdict.missing_or_empty,
            }),
        );
        if !verdict.is_pass() {
            warn!(job_id = %state.job_id, issues = ?verdict.issue_ids(), "QC failed");
        }
        state.verdict = Some(verdict);
    }

    async fn report(&self, state: &mut RunState, cancel: &CancellationToken) {
        let step = Stage::Report.step_name();
        state.trace.start(step);

        let Some(reporter) = &self.reporter else {
            state
                .trace
                .record(step, TraceStatus::Skipped, json!({ "reason": "no_reporter" }));
            return;
        };
        let (Some(record), Some(verdict)) = (
            state.extraction.as_ref().and_then(|r| r.record()),
            state.verdict.as_ref(),
        ) else {
            state
                .trace
                .record(step, TraceStatus::Skipped, json!({ "reason": "no_record" }));
            return;
        };

        let context = ReportContext {
            job_id: state.job_id.clone(),
            resume_text: state.resume_text.clone(),
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReportError::Cancelled),
            result = reporter.generate_report(record, verdict, &context) => result,
        };

        match result {
            Ok(report) => {
                state
                    .trace
                    .record(step, TraceStatus::Ok, json!({ "chars": report.len() }));
                state.report = Some(report);
            }
            Err(e) => {
                warn!(job_id = %state.job_id, "Report generation failed: {}", e);
                state.trace.record(
                    step,
                    TraceStatus::Fail,
                    json!({ "error_kind": "report_failure", "error": e.to_string() }),
                );
                state.report_error = Some(e.to_string());
            }
        }
    }

    async fn finalize(&self, state: &mut RunState) -> JobOutput {
        let step = Stage::Finalize.step_name();
        state.trace.start(step);

        let outcome = if !state.qc_passed() {
            JobOutcome::QcFailed
        } else if state.report_error.is_some() {
            JobOutcome::ReportFailed
        } else if state.report.is_some() {
            JobOutcome::Reported
        } else {
            JobOutcome::Passed
        };

        let record = if state.qc_passed() {
            state.extraction.as_ref().and_then(|r| r.record()).cloned()
        } else {
            None
        };

        state.trace.record(
            step,
            TraceStatus::Ok,
            json!({
                "outcome": outcome,
                "attempts": state.attempts.len(),
                "used_fallback": state.used_fallback,
            }),
        );

        let mut output = JobOutput {
            job_id: state.job_id.clone(),
            run_id: state.run_id,
            record,
            verdict: state.verdict.clone(),
            report: state.report.clone(),
            outcome,
            used_fallback: state.used_fallback,
            origin: state.posting.as_ref().map(|p| p.origin.clone()).unwrap_or_default(),
            attempts: state.attempts.clone(),
            trace: state.trace.snapshot(),
        };

        state.trace.start(PERSIST_STEP);
        match self.sink.persist(&output, state.posting_text()).await {
            Ok(()) => state.trace.record(PERSIST_STEP, TraceStatus::Ok, json!({})),
            Err(e) => {
                error!(job_id = %state.job_id, "Failed to persist artifacts: {}", e);
                state.trace.record(
                    PERSIST_STEP,
                    TraceStatus::Fail,
                    json!({ "error_kind": "sink_failure", "error": e.to_string() }),
                );
            }
        }
        output.trace = state.trace.snapshot();

        info!(
            job_id = %state.job_id,
            run_id = %state.run_id,
            outcome = %outcome,
            attempts = state.attempts.len(),
            used_fallback = state.used_fallback,
            "Job finished"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchedPosting;
    use async_trait::async_trait;
    use jobpulse_llm::MockProvider;

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _: &JobId, _: Option<&str>) -> Result<FetchedPosting, FetchError> {
            Ok(FetchedPosting {
                text: self.0.to_string(),
                origin: Default::default(),
            })
        }
    }

    fn api() -> Arc<dyn GenerationBackend> {
        Arc::new(MockProvider::new("{}").with_kind(BackendKind::Api))
    }

    #[test]
    fn test_initial_backend_selection() {
        let fetcher = Arc::new(StaticFetcher("text"));
        let orchestrator = Orchestrator::new(fetcher.clone(), api());
        assert_eq!(orchestrator.initial_backend(), BackendKind::Api);

        // local_first without a local backend stays on the API
        let orchestrator = orchestrator.with_local_first(true);
        assert_eq!(orchestrator.initial_backend(), BackendKind::Api);

        let orchestrator = orchestrator.with_local(Arc::new(MockProvider::new("{}")));
        assert_eq!(orchestrator.initial_backend(), BackendKind::Local);

        let orchestrator = orchestrator.with_local_first(false);
        assert_eq!(orchestrator.initial_backend(), BackendKind::Api);
    }

    #[test]
    fn test_local_slot_falls_back_to_api_contract() {
        let set = ExtractorSet::build(None, &api(), SchemaContract::permissive(), ExtractorConfig::default());
        assert!(set.for_slot(BackendKind::Local).backend_info().is_api());
    }

    #[test]
    fn test_builders_keep_schema_when_local_added() {
        let orchestrator = Orchestrator::new(Arc::new(StaticFetcher("x")), api())
            .with_schema(SchemaContract::permissive())
            .with_local(Arc::new(MockProvider::new("{}")));
        assert!(orchestrator.extractor.schema.is_empty());
        assert!(orchestrator.extractor.local.is_some());
    }

    #[test]
    fn test_batch_concurrency_floor() {
        let orchestrator =
            Orchestrator::new(Arc::new(StaticFetcher("x")), api()).with_batch_concurrency(0);
        assert_eq!(orchestrator.batch_concurrency, 1);
    }

    #[test]
    fn test_from_config_with_lookup() {
        let config = PipelineConfig {
            local_first: true,
            local: Some(crate::LocalBackendConfig::default()),
            report: Some(crate::ReportConfig::default()),
            ..Default::default()
        };
        let orchestrator =
            Orchestrator::from_config_with_lookup(&config, |_| Some("sk-test".to_string()))
                .unwrap();
        assert_eq!(orchestrator.initial_backend(), BackendKind::Local);
        assert!(orchestrator.reporter.is_some());
        assert_eq!(orchestrator.source_hint.as_deref(), Some("handshake"));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let result = Orchestrator::from_config_with_lookup(&PipelineConfig::default(), |_| None);
        assert!(matches!(result, Err(PipelineError::Backend(_))));
    }
}
