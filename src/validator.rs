//! Response validation: status checks, expected-value equality,
//! constraint evaluation, and save-as extraction.
//!
//! Every check appends a structured entry instead of raising, so
//! one bad expectation never hides the remaining checks for the
//! same step. The caller inspects the aggregate
//! [`PostProcessResult`] to decide pass/fail.

use crate::adapter::DeviceResponse;
use crate::constraint::Constraint;
use crate::errors::SuiteError;
use crate::step::Step;
use crate::value::Value;
use crate::vars::VariableStore;
use serde::Serialize;
use std::fmt;

/// Status code names treated as "not implemented": an optional
/// step answered with one of these is skipped rather than failed.
pub const NOT_IMPLEMENTED_ERRORS: &[&str] = &[
    "UNSUPPORTED_ATTRIBUTE",
    "UNSUPPORTED_COMMAND",
    "UNSUPPORTED_EVENT",
    "UNSUPPORTED_CLUSTER",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Warning,
    Error,
}

/// Which validation stage produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckCategory {
    Status,
    ClusterStatus,
    Value,
    Constraint,
    SaveAs,
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckCategory::Status => "status",
            CheckCategory::ClusterStatus => "clusterStatus",
            CheckCategory::Value => "value",
            CheckCategory::Constraint => "constraint",
            CheckCategory::SaveAs => "saveAs",
        };
        write!(f, "{name}")
    }
}

/// One check outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CheckEntry {
    pub status: CheckStatus,
    pub category: CheckCategory,
    pub message: String,
}

/// Ordered outcome of validating one response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostProcessResult {
    entries: Vec<CheckEntry>,
}

impl PostProcessResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, category: CheckCategory, message: impl Into<String>) {
        self.record(CheckStatus::Success, category, message);
    }

    pub fn record_warning(&mut self, category: CheckCategory, message: impl Into<String>) {
        self.record(CheckStatus::Warning, category, message);
    }

    pub fn record_error(&mut self, category: CheckCategory, message: impl Into<String>) {
        self.record(CheckStatus::Error, category, message);
    }

    fn record(&mut self, status: CheckStatus, category: CheckCategory, message: impl Into<String>) {
        self.entries.push(CheckEntry {
            status,
            category,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[CheckEntry] {
        &self.entries
    }

    /// A step fails iff any entry is an error; warnings alone do
    /// not fail it. An empty result (the optional-skip path) is a
    /// success.
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    pub fn is_failure(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.status == CheckStatus::Error)
    }

    pub fn error_count(&self) -> usize {
        self.count(CheckStatus::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(CheckStatus::Warning)
    }

    pub fn success_count(&self) -> usize {
        self.count(CheckStatus::Success)
    }

    fn count(&self, status: CheckStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }
}

/// Validate a device response against a materialized step and
/// commit `saveAs` extractions into the runtime store.
pub fn validate_response(
    step: &Step,
    response: &DeviceResponse,
    vars: &mut VariableStore,
) -> Result<PostProcessResult, SuiteError> {
    let mut result = PostProcessResult::new();

    // Optional steps answered "not implemented" are skipped with
    // a vacuously successful, empty result.
    if step.optional {
        if let Some(code) = &response.error {
            if NOT_IMPLEMENTED_ERRORS.contains(&code.as_str()) {
                return Ok(result);
            }
        }
    }

    check_top_level_status(step, response, &mut result);
    check_cluster_status(step, response, &mut result);
    check_expected_values(step, response, &mut result);
    check_constraints(step, response, vars, &mut result)?;
    extract_save_as(step, response, vars, &mut result);

    Ok(result)
}

fn check_top_level_status(step: &Step, response: &DeviceResponse, result: &mut PostProcessResult) {
    match (&step.response.error, &response.error) {
        // No expectation and no error: nothing to report. The
        // value/constraint checks carry the success signal.
        (None, None) => {}
        (Some(expected), Some(actual)) if expected == actual => {
            result.record_success(
                CheckCategory::Status,
                format!("received expected error {expected}"),
            );
        }
        (Some(expected), Some(actual)) => {
            result.record_error(
                CheckCategory::Status,
                format!("expected error {expected} but received {actual}"),
            );
        }
        (None, Some(actual)) => {
            result.record_error(
                CheckCategory::Status,
                format!("unexpected error {actual}"),
            );
        }
        (Some(expected), None) => {
            result.record_error(
                CheckCategory::Status,
                format!("expected error {expected} but none occurred"),
            );
        }
    }
}

fn check_cluster_status(step: &Step, response: &DeviceResponse, result: &mut PostProcessResult) {
    // Only validated when an expectation was declared.
    let Some(expected) = step.response.cluster_error else {
        return;
    };
    match response.cluster_error {
        Some(actual) if actual == expected => {
            result.record_success(
                CheckCategory::ClusterStatus,
                format!("received expected cluster error {expected}"),
            );
        }
        Some(actual) => {
            result.record_error(
                CheckCategory::ClusterStatus,
                format!("expected cluster error {expected} but received {actual}"),
            );
        }
        None => {
            result.record_error(
                CheckCategory::ClusterStatus,
                format!("expected cluster error {expected} but none occurred"),
            );
        }
    }
}

fn check_expected_values(step: &Step, response: &DeviceResponse, result: &mut PostProcessResult) {
    for spec in &step.response.values {
        let Some(expected) = &spec.value else { continue };
        match response.values.get(&spec.name) {
            None => {
                result.record_error(
                    CheckCategory::Value,
                    format!("response is missing field '{}'", spec.name),
                );
            }
            Some(actual) => {
                if expected.loosely_equals(actual) {
                    result.record_success(
                        CheckCategory::Value,
                        format!("field '{}' matches {expected}", spec.name),
                    );
                } else {
                    result.record_error(
                        CheckCategory::Value,
                        format!(
                            "field '{}' expected {expected} but was {actual}",
                            spec.name
                        ),
                    );
                }
            }
        }
    }
}

fn check_constraints(
    step: &Step,
    response: &DeviceResponse,
    vars: &VariableStore,
    result: &mut PostProcessResult,
) -> Result<(), SuiteError> {
    for spec in &step.response.values {
        let Some(block) = &spec.constraints else { continue };
        let constraints = Constraint::parse_all(block, vars)?;

        let Some(actual) = response.values.get(&spec.name) else {
            result.record_error(
                CheckCategory::Constraint,
                format!("response is missing field '{}'", spec.name),
            );
            continue;
        };

        let mut failed = Vec::new();
        for constraint in &constraints {
            if !constraint.is_met(actual)? {
                failed.push(constraint.name());
            }
        }
        // One aggregate entry per value, not one per constraint.
        if failed.is_empty() {
            result.record_success(
                CheckCategory::Constraint,
                format!("field '{}' satisfies all constraints", spec.name),
            );
        } else {
            result.record_error(
                CheckCategory::Constraint,
                format!(
                    "field '{}' value {actual} violates constraints: {}",
                    spec.name,
                    failed.join(", ")
                ),
            );
        }
    }
    Ok(())
}

fn extract_save_as(
    step: &Step,
    response: &DeviceResponse,
    vars: &mut VariableStore,
    result: &mut PostProcessResult,
) {
    for spec in &step.response.values {
        let Some(target) = &spec.save_as else { continue };
        match response.values.get(&spec.name) {
            Some(actual) => {
                vars.set(target, actual.clone());
                result.record_success(
                    CheckCategory::SaveAs,
                    format!("saved field '{}' as '{target}'", spec.name),
                );
            }
            None => {
                result.record_error(
                    CheckCategory::SaveAs,
                    format!(
                        "cannot save missing field '{}' as '{target}'",
                        spec.name
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{ResponseSpec, StepTarget, ValueSpec};
    use indexmap::IndexMap;

    fn step_with_response(values: Vec<ValueSpec>, error: Option<&str>) -> Step {
        Step {
            label: "step".to_string(),
            disabled: false,
            optional: false,
            fabric_filtered: false,
            cluster: Some("Test".to_string()),
            target: StepTarget::Attribute("Attr".to_string()),
            node_id: None,
            group_id: None,
            endpoint: Some(1),
            pics: None,
            verification: None,
            min_interval: None,
            max_interval: None,
            timed_interaction_timeout_ms: None,
            busy_wait_ms: None,
            arguments: Vec::new(),
            response: ResponseSpec {
                values,
                error: error.map(str::to_string),
                cluster_error: None,
            },
        }
    }

    fn value_spec(name: &str, value: Option<Value>) -> ValueSpec {
        ValueSpec {
            name: name.to_string(),
            value,
            constraints: None,
            save_as: None,
        }
    }

    #[test]
    fn matching_value_produces_exactly_one_success_entry() {
        let step = step_with_response(vec![value_spec("value", Some(Value::Int(7)))], None);
        let response = DeviceResponse::success().with_value("value", Value::Int(7));
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_success());
        // No vacuous status entry when neither side carries an
        // error; the value check is the only entry.
        assert_eq!(result.entries().len(), 1);
        assert_eq!(result.entries()[0].category, CheckCategory::Value);
        assert_eq!(result.success_count(), 1);
    }

    #[test]
    fn optional_step_with_unsupported_error_is_skipped_empty() {
        let mut step = step_with_response(vec![value_spec("value", Some(Value::Int(7)))], None);
        step.optional = true;
        let response = DeviceResponse::with_error("UNSUPPORTED_ATTRIBUTE");
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_success());
        assert!(result.entries().is_empty());
    }

    #[test]
    fn expected_error_but_none_occurred() {
        let step = step_with_response(vec![], Some("FAILURE"));
        let response = DeviceResponse::success();
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_failure());
        assert_eq!(result.error_count(), 1);
        assert!(result.entries()[0]
            .message
            .contains("expected error FAILURE but none occurred"));
    }

    #[test]
    fn unexpected_error_fails() {
        let step = step_with_response(vec![], None);
        let response = DeviceResponse::with_error("FAILURE");
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_failure());
    }

    #[test]
    fn matching_expected_error_succeeds() {
        let step = step_with_response(vec![], Some("CONSTRAINT_ERROR"));
        let response = DeviceResponse::with_error("CONSTRAINT_ERROR");
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_success());
    }

    #[test]
    fn cluster_error_only_checked_when_declared() {
        let mut step = step_with_response(vec![], None);
        step.response.cluster_error = Some(3);
        let response = DeviceResponse::success().with_value("x", Value::Int(1));
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_failure());

        // Without a declared expectation the channel is ignored.
        let step = step_with_response(vec![], None);
        let response = DeviceResponse::with_cluster_error(9);
        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_success());
    }

    #[test]
    fn missing_field_is_distinct_from_mismatch() {
        let step = step_with_response(
            vec![
                value_spec("present", Some(Value::Int(1))),
                value_spec("absent", Some(Value::Int(2))),
            ],
            None,
        );
        let response = DeviceResponse::success().with_value("present", Value::Int(9));
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert_eq!(result.error_count(), 2);
        let messages: Vec<&str> = result
            .entries()
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert!(messages.iter().any(|m| m.contains("missing field 'absent'")));
        assert!(messages
            .iter()
            .any(|m| m.contains("field 'present' expected 1 but was 9")));
    }

    #[test]
    fn failing_constraints_aggregate_into_one_entry() {
        let mut constraints = IndexMap::new();
        constraints.insert("minValue".to_string(), Value::Int(10));
        constraints.insert("maxValue".to_string(), Value::Int(20));
        let spec = ValueSpec {
            name: "value".to_string(),
            value: None,
            constraints: Some(constraints),
            save_as: None,
        };
        let step = step_with_response(vec![spec], None);
        let response = DeviceResponse::success().with_value("value", Value::Int(30));
        let mut vars = VariableStore::new();

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_failure());
        // Exactly one constraint entry despite minValue passing
        // and maxValue failing being separate checks.
        let constraint_entries: Vec<&CheckEntry> = result
            .entries()
            .iter()
            .filter(|e| e.category == CheckCategory::Constraint)
            .collect();
        assert_eq!(constraint_entries.len(), 1);
        assert!(constraint_entries[0].message.contains("maxValue"));
        assert!(!constraint_entries[0].message.contains("minValue"));
    }

    #[test]
    fn save_as_commits_to_the_runtime_store() {
        let spec = ValueSpec {
            name: "value".to_string(),
            value: None,
            constraints: None,
            save_as: Some("savedValue".to_string()),
        };
        let step = step_with_response(vec![spec], None);
        let response = DeviceResponse::success().with_value("value", Value::Int(42));
        let mut vars = VariableStore::new();
        vars.declare("savedValue");

        let result = validate_response(&step, &response, &mut vars).unwrap();
        assert!(result.is_success());
        assert_eq!(vars.get("savedValue"), Some(&Value::Int(42)));
    }

    #[test]
    fn evaluating_has_value_is_fatal() {
        let mut constraints = IndexMap::new();
        constraints.insert("hasValue".to_string(), Value::Bool(true));
        let spec = ValueSpec {
            name: "value".to_string(),
            value: None,
            constraints: Some(constraints),
            save_as: None,
        };
        let step = step_with_response(vec![spec], None);
        let response = DeviceResponse::success().with_value("value", Value::Int(1));
        let mut vars = VariableStore::new();

        let err = validate_response(&step, &response, &mut vars).unwrap_err();
        assert!(matches!(err, SuiteError::UnsupportedConstraint));
    }
}
