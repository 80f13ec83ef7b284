//! JobPulse Gatekeeper
//!
//! Quality control for extracted records.
//!
//! The Gatekeeper provides:
//! - Required-field coverage (present and non-empty)
//! - "Any-of" group coverage (at least one member non-empty)
//! - A pass/fail [`QcVerdict`](jobpulse_domain::QcVerdict) with named issues
//!
//! Evaluation is a pure function of the record and the rule set; it never
//! fails and never performs I/O.
//!
//! # Examples
//!
//! ```
//! use jobpulse_domain::{BackendInfo, BackendKind, StructuredRecord};
//! use jobpulse_gatekeeper::{QcRules, QualityGate};
//! use serde_json::json;
//!
//! let gate = QualityGate::new(QcRules::job_posting());
//! let record = StructuredRecord::new()
//!     .with_field("role_title", json!("Data Engineer"))
//!     .with_field("company", json!("Acme"))
//!     .with_field("requirements", json!(["SQL"]))
//!     .with_field("responsibilities", json!([]));
//! let producer = BackendInfo::new(BackendKind::Local, "ollama", "qwen");
//!
//! let verdict = gate.evaluate(Some(&record), false, &producer);
//! assert!(!verdict.is_pass());
//! assert_eq!(verdict.missing_or_empty, vec!["responsibilities"]);
//! ```

#![warn(missing_docs)]

mod validator;
mod error;
mod config;

pub use validator::QualityGate;
pub use error::GatekeeperError;
pub use config::QcRules;
