//! Schema contract for structured job records

use serde::{Deserialize, Serialize};

/// Fields of the canonical job posting record, in emission order
pub const JOB_POSTING_FIELDS: &[&str] = &[
    "role_title",
    "company",
    "location",
    "employment_type",
    "remote_policy",
    "responsibilities",
    "requirements",
    "preferred_qualifications",
    "skills",
    "years_experience_min",
    "degree_level",
    "visa_sponsorship",
];

/// Fields of the canonical job posting record that hold lists of strings
pub const JOB_POSTING_LIST_FIELDS: &[&str] = &[
    "responsibilities",
    "requirements",
    "preferred_qualifications",
    "skills",
];

/// Declares which keys an extracted record must carry
///
/// Every name in `required` must be a key of the record. Every name in
/// `list_fields` must, when present, hold a list. An empty contract
/// accepts any JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaContract {
    /// Keys that must be present
    #[serde(default)]
    pub required: Vec<String>,

    /// Keys that must hold a list when present
    #[serde(default)]
    pub list_fields: Vec<String>,
}

impl SchemaContract {
    /// Create a contract from field name slices
    pub fn new<R, L>(required: R, list_fields: L) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            list_fields: list_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The canonical job posting contract
    pub fn job_posting() -> Self {
        Self::new(
            JOB_POSTING_FIELDS.iter().copied(),
            JOB_POSTING_LIST_FIELDS.iter().copied(),
        )
    }

    /// A contract that accepts any object
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Whether the named field is declared list-typed
    pub fn is_list_field(&self, field: &str) -> bool {
        self.list_fields.iter().any(|f| f == field)
    }

    /// Whether the contract imposes no checks
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.list_fields.is_empty()
    }
}
