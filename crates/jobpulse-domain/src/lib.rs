//! JobPulse Domain Layer
//!
//! This crate contains the data model shared by every other JobPulse crate.
//! It holds no I/O and no pipeline logic; only value types and the rules
//! that are intrinsic to them.
//!
//! ## Key Concepts
//!
//! - **StructuredRecord**: ordered field map extracted from a job posting
//! - **SchemaContract**: required fields and list-typed fields a record must honor
//! - **QcVerdict**: pass/fail outcome of the quality gate with named issues
//! - **TraceEvent / TraceLog**: append-only execution trace of one run
//! - **BackendInfo**: which generation backend produced an artifact
//!
//! ## Architecture
//!
//! Infrastructure (LLM providers) and application layers (extractor,
//! gatekeeper, orchestrator) depend on this crate, never the reverse.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod job;
pub mod record;
pub mod schema;
pub mod trace;
pub mod verdict;

// Re-exports for convenience
pub use backend::{BackendInfo, BackendKind};
pub use job::{JobId, RunId};
pub use record::{json_type_name, value_is_non_empty, StructuredRecord};
pub use schema::{SchemaContract, JOB_POSTING_FIELDS, JOB_POSTING_LIST_FIELDS};
pub use trace::{TraceEvent, TraceLog, TraceStatus};
pub use verdict::{QcIssue, QcStatus, QcVerdict};
