//! Quality-control verdict

use crate::BackendInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Overall QC status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcStatus {
    /// Zero issues
    Pass,

    /// At least one issue
    Fail,
}

impl QcStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            QcStatus::Pass => "pass",
            QcStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named QC rule violation
///
/// Serialized as its identifier string, e.g. `parse_failed` or
/// `low_coverage_any_of:[requirements,responsibilities]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QcIssue {
    /// The extraction stage produced no record
    ParseFailed,

    /// No field of the group is non-empty
    LowCoverageAnyOf(Vec<String>),

    /// One or more required fields are missing or empty.
    ///
    /// Aggregate issue; the per-field detail lives in
    /// [`QcVerdict::missing_or_empty`].
    MissingOrEmptyRequired,
}

impl QcIssue {
    /// Prefix shared by all any-of coverage issues
    pub const ANY_OF_PREFIX: &'static str = "low_coverage_any_of";

    /// Identifier without the group detail
    pub fn code(&self) -> &'static str {
        match self {
            QcIssue::ParseFailed => "parse_failed",
            QcIssue::LowCoverageAnyOf(_) => Self::ANY_OF_PREFIX,
            QcIssue::MissingOrEmptyRequired => "missing_or_empty_required",
        }
    }
}

impl fmt::Display for QcIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QcIssue::LowCoverageAnyOf(group) => {
                write!(f, "{}:[{}]", Self::ANY_OF_PREFIX, group.join(","))
            }
            other => f.write_str(other.code()),
        }
    }
}

impl std::str::FromStr for QcIssue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parse_failed" => return Ok(QcIssue::ParseFailed),
            "missing_or_empty_required" => return Ok(QcIssue::MissingOrEmptyRequired),
            _ => {}
        }

        let group = s
            .strip_prefix(Self::ANY_OF_PREFIX)
            .and_then(|rest| rest.strip_prefix(":["))
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| format!("Unknown QC issue: {}", s))?;

        let fields = group
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect();
        Ok(QcIssue::LowCoverageAnyOf(fields))
    }
}

impl Serialize for QcIssue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QcIssue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Result of one quality-gate evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcVerdict {
    /// Pass iff `issues` is empty
    pub status: QcStatus,

    /// Rule violations, in evaluation order
    pub issues: Vec<QcIssue>,

    /// Required fields that are missing or empty
    pub missing_or_empty: Vec<String>,

    /// Per required field: 1 if non-empty, 0 otherwise
    pub coverage: BTreeMap<String, u8>,

    /// Whether the salvage parser had to repair the backend output
    pub parse_repaired: bool,

    /// Backend that produced the evaluated record
    pub producer: BackendInfo,
}

impl QcVerdict {
    /// Whether the verdict passed
    pub fn is_pass(&self) -> bool {
        self.status == QcStatus::Pass
    }

    /// Issue identifiers as strings
    pub fn issue_ids(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    /// Whether any issue has the given code (e.g. `low_coverage_any_of`)
    pub fn has_issue_code(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code() == code)
    }
}
