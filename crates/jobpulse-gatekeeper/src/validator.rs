//! Record coverage evaluation

use crate::QcRules;
use jobpulse_domain::{
    value_is_non_empty, BackendInfo, QcIssue, QcStatus, QcVerdict, StructuredRecord,
};
use std::collections::BTreeMap;
use tracing::debug;

/// The quality gate scores extracted records against a rule set
#[derive(Debug, Clone)]
pub struct QualityGate {
    rules: QcRules,
}

impl QualityGate {
    /// Create a new gate with the given rules
    pub fn new(rules: QcRules) -> Self {
        Self { rules }
    }

    /// Create a gate with the default job posting rules
    pub fn default_config() -> Self {
        Self::new(QcRules::default())
    }

    /// The rules in force
    pub fn rules(&self) -> &QcRules {
        &self.rules
    }

    /// Evaluate a record (or its absence) against the configured rules
    ///
    /// # Arguments
    ///
    /// * `record` - The extracted record, `None` if extraction failed
    /// * `parse_repaired` - Whether the salvage parser had to repair the output
    /// * `producer` - The backend that produced the record
    ///
    /// # Returns
    ///
    /// A verdict that passes iff no issue was found. Missing required fields
    /// contribute a single `missing_or_empty_required` issue; the per-field
    /// detail is in `missing_or_empty`.
    pub fn evaluate(
        &self,
        record: Option<&StructuredRecord>,
        parse_repaired: bool,
        producer: &BackendInfo,
    ) -> QcVerdict {
        // 1. No record: nothing to measure
        let Some(record) = record else {
            debug!(producer = %producer, "QC fail: no record");
            return QcVerdict {
                status: QcStatus::Fail,
                issues: vec![QcIssue::ParseFailed],
                missing_or_empty: self.rules.require_keys.clone(),
                coverage: BTreeMap::new(),
                parse_repaired,
                producer: producer.clone(),
            };
        };

        let mut issues = Vec::new();
        let mut missing_or_empty = Vec::new();
        let mut coverage = BTreeMap::new();

        // 2. Required field coverage
        for key in &self.rules.require_keys {
            let ok = record.get(key).is_some_and(value_is_non_empty);
            coverage.insert(key.clone(), u8::from(ok));
            if !ok {
                missing_or_empty.push(key.clone());
            }
        }

        // 3. Any-of groups
        for group in &self.rules.require_non_empty_any_of {
            let covered = group
                .iter()
                .any(|key| record.get(key).is_some_and(value_is_non_empty));
            if !covered {
                issues.push(QcIssue::LowCoverageAnyOf(group.clone()));
            }
        }

        // 4. One aggregate issue for all missing required fields
        if !missing_or_empty.is_empty() {
            issues.push(QcIssue::MissingOrEmptyRequired);
        }

        let status = if issues.is_empty() {
            QcStatus::Pass
        } else {
            QcStatus::Fail
        };

        debug!(
            producer = %producer,
            status = %status,
            issues = issues.len(),
            missing = missing_or_empty.len(),
            "QC evaluated"
        );

        QcVerdict {
            status,
            issues,
            missing_or_empty,
            coverage,
            parse_repaired,
            producer: producer.clone(),
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobpulse_domain::BackendKind;
    use serde_json::json;

    fn producer() -> BackendInfo {
        BackendInfo::new(BackendKind::Local, "mock", "mock-model")
    }

    fn full_record() -> StructuredRecord {
        StructuredRecord::new()
            .with_field("role_title", json!("Backend Engineer"))
            .with_field("company", json!("Initech"))
            .with_field("requirements", json!(["Go", "Postgres"]))
            .with_field("responsibilities", json!(["Own the billing service"]))
    }

    #[test]
    fn test_complete_record_passes() {
        let gate = QualityGate::default_config();
        let verdict = gate.evaluate(Some(&full_record()), false, &producer());

        assert!(verdict.is_pass());
        assert!(verdict.issues.is_empty());
        assert!(verdict.missing_or_empty.is_empty());
        assert_eq!(verdict.coverage.len(), 4);
        assert!(verdict.coverage.values().all(|&c| c == 1));
        assert_eq!(verdict.producer, producer());
    }

    #[test]
    fn test_no_record_is_parse_failed() {
        let gate = QualityGate::default_config();
        let verdict = gate.evaluate(None, true, &producer());

        assert_eq!(verdict.status, QcStatus::Fail);
        assert_eq!(verdict.issues, vec![QcIssue::ParseFailed]);
        assert_eq!(verdict.missing_or_empty, gate.rules().require_keys);
        assert!(verdict.coverage.is_empty());
        assert!(verdict.parse_repaired);
    }

    #[test]
    fn test_any_of_both_empty_fails() {
        let rules = QcRules::new(
            Vec::<String>::new(),
            vec![vec!["requirements".to_string(), "responsibilities".to_string()]],
        );
        let gate = QualityGate::new(rules);
        let record = StructuredRecord::new()
            .with_field("requirements", json!([]))
            .with_field("responsibilities", json!(null));

        let verdict = gate.evaluate(Some(&record), false, &producer());
        assert!(!verdict.is_pass());
        assert_eq!(
            verdict.issue_ids(),
            vec!["low_coverage_any_of:[requirements,responsibilities]"]
        );
    }

    #[test]
    fn test_any_of_one_non_empty_passes() {
        let rules = QcRules::new(
            Vec::<String>::new(),
            vec![vec!["requirements".to_string(), "responsibilities".to_string()]],
        );
        let gate = QualityGate::new(rules);

        let record = StructuredRecord::new().with_field("responsibilities", json!(["Ship"]));
        assert!(gate.evaluate(Some(&record), false, &producer()).is_pass());

        let record = StructuredRecord::new().with_field("requirements", json!(["SQL"]));
        assert!(gate.evaluate(Some(&record), false, &producer()).is_pass());
    }

    #[test]
    fn test_missing_required_is_single_aggregate_issue() {
        let gate = QualityGate::default_config();
        let record = full_record()
            .with_field("role_title", json!("   "))
            .with_field("company", json!(null));

        let verdict = gate.evaluate(Some(&record), false, &producer());
        assert_eq!(verdict.issues, vec![QcIssue::MissingOrEmptyRequired]);
        assert_eq!(verdict.missing_or_empty, vec!["role_title", "company"]);
        assert_eq!(verdict.coverage["role_title"], 0);
        assert_eq!(verdict.coverage["company"], 0);
        assert_eq!(verdict.coverage["requirements"], 1);
    }

    #[test]
    fn test_any_of_issue_precedes_aggregate() {
        let gate = QualityGate::default_config();
        let record = StructuredRecord::new()
            .with_field("role_title", json!("Analyst"))
            .with_field("company", json!("Acme"))
            .with_field("requirements", json!([]))
            .with_field("responsibilities", json!(""));

        let verdict = gate.evaluate(Some(&record), false, &producer());
        assert_eq!(
            verdict.issue_ids(),
            vec![
                "low_coverage_any_of:[requirements,responsibilities]",
                "missing_or_empty_required",
            ]
        );
        assert_eq!(verdict.missing_or_empty, vec!["requirements", "responsibilities"]);
    }

    #[test]
    fn test_non_string_values_count_as_present() {
        let gate = QualityGate::new(QcRules::new(["years", "remote", "meta"], vec![]));
        let record = StructuredRecord::new()
            .with_field("years", json!(0))
            .with_field("remote", json!(false))
            .with_field("meta", json!({}));

        assert!(gate.evaluate(Some(&record), false, &producer()).is_pass());
    }

    #[test]
    fn test_permissive_rules_pass_empty_record() {
        let gate = QualityGate::new(QcRules::permissive());
        let verdict = gate.evaluate(Some(&StructuredRecord::new()), false, &producer());
        assert!(verdict.is_pass());
        assert!(verdict.coverage.is_empty());
    }

    #[test]
    fn test_parse_repaired_is_carried() {
        let gate = QualityGate::default_config();
        let verdict = gate.evaluate(Some(&full_record()), true, &producer());
        assert!(verdict.is_pass());
        assert!(verdict.parse_repaired);
    }
}
