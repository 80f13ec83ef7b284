//! JobPulse Extractor
//!
//! Turns job posting text into a schema-checked [`StructuredRecord`] by way
//! of an unreliable generation backend.
//!
//! # Overview
//!
//! Backends return raw completion text with no structural guarantee: fenced
//! code blocks, chatty preambles, trailing commentary and truncated objects
//! are all common. The extractor tolerates these, then holds the result to a
//! [`SchemaContract`].
//!
//! # Architecture
//!
//! ```text
//! posting → clean_posting → PromptTemplate → GenerationBackend
//!         → salvage_object → validate_schema → ExtractionResult
//! ```
//!
//! # Key Features
//!
//! - **Salvage parser**: direct parse, bracket repair, last-resort block scan
//! - **Schema validation**: required keys and list-typed keys
//! - **Bounded calls**: every backend call has a timeout and honors cancellation
//! - **Failure as data**: every failure becomes an [`ExtractionResult`] with an
//!   [`ExtractionError`] kind; nothing is raised to the caller
//!
//! # Example Usage
//!
//! ```no_run
//! use jobpulse_domain::SchemaContract;
//! use jobpulse_extractor::{ExtractorConfig, ExtractorContract};
//! use jobpulse_llm::OllamaProvider;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(OllamaProvider::default_endpoint("qwen2.5:3b-instruct")?);
//! let contract = ExtractorContract::new(
//!     backend,
//!     SchemaContract::job_posting(),
//!     ExtractorConfig::default(),
//! );
//!
//! let result = contract
//!     .extract_posting("Senior Data Engineer at Acme ...", &CancellationToken::new())
//!     .await;
//!
//! match result.record() {
//!     Some(record) => println!("role: {:?}", record.text("role_title")),
//!     None => println!("failed: {:?}", result.error()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`StructuredRecord`]: jobpulse_domain::StructuredRecord
//! [`SchemaContract`]: jobpulse_domain::SchemaContract

#![warn(missing_docs)]

mod error;
mod config;
mod contract;
pub mod clean;
pub mod prompt;
pub mod salvage;


pub use error::{BackendFailure, ConfigError, ExtractionError, PromptError};
pub use config::ExtractorConfig;
pub use contract::{validate_schema, ExtractionResult, ExtractorContract};
pub use clean::clean_posting;
pub use prompt::{PromptTemplate, PromptVersion};
pub use salvage::{
    salvage_object, SalvageError, SalvageFailure, SalvageParser, SalvagePhase, Salvaged,
};
