//! JobPulse Orchestrator
//!
//! Drives a job posting through the pipeline and decides what happens when
//! a stage fails.
//!
//! # Overview
//!
//! The Orchestrator is responsible for:
//! - **Sequencing**: fetch, extract, QC, report, finalize
//! - **Fallback**: one retry on the API backend when the local backend's
//!   record fails QC
//! - **Tracing**: a `start` and a terminal event for every stage entered
//! - **Persistence**: handing each finished job to an [`ArtifactSink`]
//! - **Batching**: running independent jobs concurrently
//!
//! # Stage Graph
//!
//! | From | To |
//! |------|----|
//! | `fetch` | `extract_local` if local-first and a local backend exists, else `extract_api` |
//! | `extract_*` | `qc` |
//! | `qc` (pass) | `report` |
//! | `qc` (fail, after local, no fallback yet) | `extract_api` |
//! | `qc` (fail, otherwise) | `finalize` |
//! | `report` | `finalize` |
//! | `finalize` | done |
//!
//! A fetch failure is the only error that stops a job: [`Orchestrator::run`]
//! returns [`PipelineError::Fetch`], which carries the trace up to the failed
//! fetch. A fetcher that returns blank text counts as a fetch failure. Every
//! other failure is recorded in the trace and the job still finalizes.
//!
//! After `finalize` closes, the output is handed to the [`ArtifactSink`]
//! inside a separate [`PERSIST_STEP`] step, so the persisted trace is complete
//! and the returned one also records whether persistence succeeded.
//!
//! # Usage
//!
//! ```no_run
//! use jobpulse_orchestrator::{JobRequest, Orchestrator, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_file("jobpulse.toml")?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!
//!     let output = orchestrator
//!         .run(JobRequest::new("10293847").with_resume("Five years of Python"))
//!         .await?;
//!     println!("{}: {}", output.job_id, output.outcome);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod error;
mod orchestrator;
pub mod config;
pub mod fetch;
pub mod output;
pub mod report;
pub mod sink;
pub mod state;

pub use config::{ApiBackendConfig, LocalBackendConfig, PipelineConfig, ReportConfig};
pub use error::{ConfigError, FetchError, PipelineError, ReportError, SinkError};
pub use fetch::{DirFetcher, FetchedPosting, Fetcher};
pub use orchestrator::{Orchestrator, PERSIST_STEP};
pub use output::{AttemptSummary, BatchSummary, JobOutcome, JobOutput};
pub use report::{build_report_prompt, LlmReporter, ReportContext, Reporter};
pub use sink::{ArtifactSink, DirArtifactSink, NullSink};
pub use state::{next_stage, JobRequest, RunState, Stage};
