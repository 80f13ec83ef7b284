//! Prompt templates for job posting extraction

use crate::error::PromptError;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the cleaned posting text
pub const PLACEHOLDER: &str = "{{JOB_DESCRIPTION}}";

/// Built-in template versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PromptVersion {
    /// Original field list, no per-field guidance
    #[serde(rename = "jd_extract_v1")]
    V1,

    /// Field guidance and stricter output rules
    #[default]
    #[serde(rename = "jd_extract_v2")]
    V2,
}

impl PromptVersion {
    /// Version name as stored in config and trace metadata
    pub fn name(&self) -> &'static str {
        match self {
            PromptVersion::V1 => "jd_extract_v1",
            PromptVersion::V2 => "jd_extract_v2",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            PromptVersion::V1 => JD_EXTRACT_V1,
            PromptVersion::V2 => JD_EXTRACT_V2,
        }
    }
}

impl std::str::FromStr for PromptVersion {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jd_extract_v1" => Ok(PromptVersion::V1),
            "jd_extract_v2" => Ok(PromptVersion::V2),
            other => Err(PromptError::UnknownVersion(other.to_string())),
        }
    }
}

/// A named prompt template with a single posting placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    body: String,
}

impl PromptTemplate {
    /// Create a template, checking that it contains the placeholder
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Result<Self, PromptError> {
        let name = name.into();
        let body = body.into();
        if !body.contains(PLACEHOLDER) {
            return Err(PromptError::MissingPlaceholder(name));
        }
        Ok(Self { name, body })
    }

    /// One of the built-in templates
    pub fn builtin(version: PromptVersion) -> Self {
        Self {
            name: version.name().to_string(),
            body: version.body().to_string(),
        }
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Substitute the posting text into the template
    pub fn render(&self, posting_text: &str) -> String {
        self.body.replace(PLACEHOLDER, posting_text)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin(PromptVersion::default())
    }
}

const JD_EXTRACT_V1: &str = r#"Extract structured information from the job description below.

Return a single JSON object with exactly these keys:
role_title, company, location, employment_type, remote_policy,
responsibilities, requirements, preferred_qualifications, skills,
years_experience_min, degree_level, visa_sponsorship

Use null for unknown scalar values and [] for unknown lists.

Job description:
{{JOB_DESCRIPTION}}

JSON:"#;

const JD_EXTRACT_V2: &str = r#"You extract structured data from job postings.

Return ONLY one JSON object. No markdown, no code fences, no commentary.

Keys and types:
- "role_title": string or null
- "company": string or null
- "location": string or null
- "employment_type": string or null (Internship, Full-time, Part-time, Contract)
- "remote_policy": string or null (Remote, Hybrid, Onsite)
- "responsibilities": list of strings
- "requirements": list of strings (must-have qualifications)
- "preferred_qualifications": list of strings (nice-to-have qualifications)
- "skills": list of strings (technologies, tools, languages)
- "years_experience_min": integer or null
- "degree_level": string or null (BS, MS, PhD, Any)
- "visa_sponsorship": string or null (Yes, No, Unclear)

Rules:
- Copy facts from the posting; do not invent them.
- Keep list items short, one requirement or duty per item.
- Every key must be present. Use null or [] when the posting is silent.

Job posting:
"""
{{JOB_DESCRIPTION}}
"""
"#;
