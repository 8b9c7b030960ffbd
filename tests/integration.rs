use std::path::PathBuf;
use std::sync::Arc;

use gluon::{
    loader, DeviceResponse, ScriptedAdapter, StaticSchemaRegistry, StepStatus, SuiteRunner, Value,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn schema() -> StaticSchemaRegistry {
    let mut registry = StaticSchemaRegistry::new();
    registry.insert_scalar("Counter", "Count", "int64u");
    registry.insert_scalar("Thermostat", "OutdoorTemperature", "int16s");
    registry.insert_scalar("Thermostat", "LocalTemperature", "int16s");
    registry
}

#[tokio::test]
async fn saved_value_feeds_the_next_step_expression() {
    let suite = loader::load_suite(&fixture("counter.yaml"), &schema()).unwrap();
    assert_eq!(suite.name, "Counter save and reuse");

    let adapter = Arc::new(ScriptedAdapter::new([
        DeviceResponse::success().with_value("Count", Value::Int(41)),
        DeviceResponse::success().with_value("Count", Value::Int(42)),
    ]));
    let runner = SuiteRunner::new(adapter);

    let result = runner.run(&suite).await.unwrap();
    assert!(result.success, "suite failed: {:?}", result.steps);
    assert_eq!(result.passed(), 2);
}

#[tokio::test]
async fn stale_saved_value_fails_the_comparison() {
    let suite = loader::load_suite(&fixture("counter.yaml"), &schema()).unwrap();

    // Second read returns the same count, so "firstCount + 1" no
    // longer matches.
    let adapter = Arc::new(ScriptedAdapter::new([
        DeviceResponse::success().with_value("Count", Value::Int(41)),
        DeviceResponse::success().with_value("Count", Value::Int(41)),
    ]));
    let runner = SuiteRunner::new(adapter);

    let result = runner.run(&suite).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.failed(), 1);
}

#[tokio::test]
async fn optional_step_skips_on_unsupported_attribute() {
    let suite = loader::load_suite(&fixture("optional.yaml"), &schema()).unwrap();

    let adapter = Arc::new(ScriptedAdapter::new([
        DeviceResponse::with_error("UNSUPPORTED_ATTRIBUTE"),
        DeviceResponse::success().with_value("LocalTemperature", Value::Int(2100)),
    ]));
    let runner = SuiteRunner::new(adapter);

    let result = runner.run(&suite).await.unwrap();
    assert!(result.success, "suite failed: {:?}", result.steps);
    // The skipped probe produces no check entries at all.
    assert!(result.steps[0].entries.is_empty());
    assert!(!result.steps[1].entries.is_empty());
}

#[tokio::test]
async fn mandatory_step_fails_on_unsupported_attribute() {
    let suite = loader::load_suite(&fixture("optional.yaml"), &schema()).unwrap();

    let adapter = Arc::new(ScriptedAdapter::new([
        DeviceResponse::with_error("UNSUPPORTED_ATTRIBUTE"),
        DeviceResponse::with_error("UNSUPPORTED_ATTRIBUTE"),
    ]));
    let runner = SuiteRunner::new(adapter).continue_on_failure(true);

    let result = runner.run(&suite).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.steps[0].status, StepStatus::Passed);
    assert_eq!(result.steps[1].status, StepStatus::Failed);
}

#[tokio::test]
async fn expected_errors_must_occur_and_match() {
    let suite = loader::load_suite(&fixture("errors.yaml"), &schema()).unwrap();

    let adapter = Arc::new(ScriptedAdapter::new([
        DeviceResponse::with_error("UNSUPPORTED_WRITE"),
        DeviceResponse::with_cluster_error(1),
    ]));
    let runner = SuiteRunner::new(adapter);

    let result = runner.run(&suite).await.unwrap();
    assert!(result.success, "suite failed: {:?}", result.steps);
}

#[tokio::test]
async fn a_success_where_an_error_was_expected_fails() {
    let suite = loader::load_suite(&fixture("errors.yaml"), &schema()).unwrap();

    let adapter = Arc::new(ScriptedAdapter::new([
        DeviceResponse::success(),
        DeviceResponse::with_cluster_error(1),
    ]));
    let runner = SuiteRunner::new(adapter);

    let result = runner.run(&suite).await.unwrap();
    assert!(!result.success);
    // Default policy stops after the failing first step.
    assert_eq!(result.steps.len(), 1);
}

#[tokio::test]
async fn fixtures_directory_is_discoverable() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let files = loader::discover_suite_files(&dir).unwrap();
    assert_eq!(files.len(), 3);
}
