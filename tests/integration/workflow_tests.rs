use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use tempfile::TempDir;
use wo::WoError;
use wo::arm::ArmClient;
use wo::capability::{self, Capability};
use wo::config::{Config, Hierarchy};
use wo::dynconfig::render_values;
use wo::test_utils::{RecordingSleeper, StaticTokenCredential};
use wo::version::MemoryVersionSource;
use wo::workflow::{Workflow, WorkflowOptions};

use crate::common::{arm_from_config, config, edge_path};

fn single_hierarchy(config: &mut Config) {
    config.context.hierarchies = vec![Hierarchy {
        name: "line".to_string(),
        description: "Production line".to_string(),
    }];
}

fn mock_context(server: &MockServer, capabilities: serde_json::Value) {
    let path = edge_path("ctx-rg", "contexts/ctx");
    server.mock(|when, then| {
        when.method(GET).path(path.as_str());
        then.status(200).json_body(json!({
            "name": "ctx",
            "properties": {"capabilities": capabilities}
        }));
    });
}

#[test]
fn context_update_merges_and_verifies() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let mut config = config(&server, state.path());
    single_hierarchy(&mut config);

    mock_context(
        &server,
        json!([{"name": "a", "description": "Capability A"}, {"name": "b"}]),
    );
    let context_path = edge_path("ctx-rg", "contexts/ctx");
    let upsert = server.mock(|when, then| {
        when.method(PUT).path(context_path.as_str()).json_body(json!({
            "location": "eastus",
            "properties": {
                "capabilities": [
                    {"name": "a", "description": "Capability A"},
                    {"name": "b", "description": "Existing capability: b"}
                ],
                "hierarchies": [{"name": "line", "description": "Production line"}]
            }
        }));
        then.status(200)
            .json_body(json!({"properties": {"provisioningState": "Succeeded"}}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = arm_from_config(&config, &sleeper);
    let versions = MemoryVersionSource::default();
    let mut workflow = Workflow::new(&config, &arm, &versions);

    let outcome = workflow
        .run_context(Some(Capability::new("b", "requested")), false)
        .unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.existing, 2);
    assert_eq!(outcome.selected.name, "b");
    assert_eq!(outcome.selected.description, "Existing capability: b");
    assert_eq!(outcome.report.rejected, vec!["b".to_string()]);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(30)]);
    upsert.assert();

    let saved = capability::load(&config.state.capabilities_file).unwrap();
    assert_eq!(saved, outcome.capabilities);
    assert!(workflow.warnings().is_empty());
}

#[test]
fn context_update_fails_when_capability_never_appears() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let config = config(&server, state.path());

    mock_context(&server, json!([{"name": "a", "description": "Capability A"}]));
    let context_path = edge_path("ctx-rg", "contexts/ctx");
    server.mock(|when, then| {
        when.method(PUT).path(context_path.as_str());
        then.status(200).json_body(json!({}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = arm_from_config(&config, &sleeper);
    let versions = MemoryVersionSource::default();
    let mut workflow = Workflow::new(&config, &arm, &versions);

    let err = workflow
        .run_context(Some(Capability::new("b", "new")), false)
        .unwrap_err();
    assert!(matches!(err, WoError::Validation(ref msg) if msg.contains("b")));
}

#[test]
fn dry_run_never_writes() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let config = config(&server, state.path());

    let context_path = edge_path("ctx-rg", "contexts/ctx");
    server.mock(|when, then| {
        when.method(GET).path(context_path.as_str());
        then.status(404).json_body(json!({"error": {"code": "NotFound", "message": "none"}}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = arm_from_config(&config, &sleeper);
    let versions = MemoryVersionSource::default();
    let mut workflow =
        Workflow::new(&config, &arm, &versions).with_rng(StdRng::seed_from_u64(7));

    let outcome = workflow.run_context(None, true).unwrap();
    assert!(!outcome.updated);
    assert_eq!(outcome.existing, 0);
    assert_eq!(outcome.capabilities.len(), 1);
    assert!(outcome.selected.name.starts_with("sdkexamples-"));
    assert_eq!(outcome.saved_to.as_deref(), Some(config.state.capabilities_file.as_path()));
    assert!(sleeper.delays().is_empty());
}

#[test]
fn full_run_reports_lifecycle_warnings() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let config = config(&server, state.path());

    mock_context(&server, json!([{"name": "a", "description": "A"}, {"name": "b", "description": "B"}]));
    let context_path = edge_path("ctx-rg", "contexts/ctx");
    server.mock(|when, then| {
        when.method(PUT).path(context_path.as_str());
        then.status(200).json_body(json!({}));
    });

    let schema = edge_path("rg-test", "schemas/sdkexamples-schema-v1");
    let schema_mock = server.mock(|when, then| {
        when.method(PUT)
            .path(schema.as_str())
            .json_body(json!({"location": "eastus", "properties": {}}));
        then.status(200).json_body(json!({"name": "sdkexamples-schema-v1"}));
    });
    let schema_version = edge_path("rg-test", "schemas/sdkexamples-schema-v1/versions/1.0.2");
    let schema_version_mock = server.mock(|when, then| {
        when.method(PUT).path(schema_version.as_str());
        then.status(200).json_body(json!({}));
    });

    let template = edge_path("rg-test", "solutionTemplates/sdkexamples-solution1");
    let template_mock = server.mock(|when, then| {
        when.method(PUT).path(template.as_str()).json_body(json!({
            "location": "eastus",
            "properties": {
                "capabilities": ["b"],
                "description": "This is Holtmelt Solution with random capabilities"
            }
        }));
        then.status(200).json_body(json!({}));
    });
    let create_version = format!("{template}/createVersion");
    let template_version_id = format!("{template}/versions/1.0.3");
    server.mock(|when, then| {
        when.method(POST).path(create_version.as_str());
        then.status(200).json_body(json!({"id": template_version_id}));
    });

    let target = edge_path("rg-test", "targets/sdkbox-mk71");
    let operation = server.url("/ops/target");
    server.mock(|when, then| {
        when.method(PUT).path(target.as_str());
        then.status(201)
            .header("Azure-AsyncOperation", operation.as_str())
            .json_body(json!({"properties": {"provisioningState": "Accepted"}}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/ops/target");
        then.status(200).json_body(json!({"status": "Succeeded"}));
    });
    server.mock(|when, then| {
        when.method(GET).path(target.as_str());
        then.status(200).json_body(json!({"name": "sdkbox-mk71"}));
    });

    let dynamic = edge_path(
        "rg-test",
        "configurations/sdkbox-mk71Config/DynamicConfigurations/sdkexamples-solution1/versions/version1",
    );
    server.mock(|when, then| {
        when.method(PUT).path(dynamic.as_str());
        then.status(200).json_body(json!({}));
    });
    let stored = render_values(&config.configuration.values);
    server.mock(|when, then| {
        when.method(GET).path(dynamic.as_str());
        then.status(200).json_body(json!({
            "properties": {"values": stored, "provisioningState": "Succeeded"}
        }));
    });

    let review = format!("{target}/reviewSolutionVersion");
    let review_mock = server.mock(|when, then| {
        when.method(POST).path(review.as_str()).json_body(json!({
            "solutionDependencies": [],
            "solutionInstanceName": "sdkbox-mk71",
            "solutionTemplateVersionId": template_version_id
        }));
        then.status(200).json_body(json!({"id": "/solutionVersions/sv-1"}));
    });
    let publish = format!("{target}/publishSolutionVersion");
    let publish_mock = server.mock(|when, then| {
        when.method(POST)
            .path(publish.as_str())
            .json_body(json!({"solutionVersionId": "/solutionVersions/sv-1"}));
        then.status(200).json_body(json!({}));
    });
    let install = format!("{target}/installSolution");
    server.mock(|when, then| {
        when.method(POST).path(install.as_str());
        then.status(500)
            .json_body(json!({"error": {"code": "InternalError", "message": "agent offline"}}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = arm_from_config(&config, &sleeper);
    let versions = MemoryVersionSource::default();
    let mut workflow = Workflow::new(&config, &arm, &versions);
    let options = WorkflowOptions {
        capability: Some(Capability::new("b", "")),
        ..WorkflowOptions::default()
    };

    let report = workflow.run(&options).unwrap();

    assert_eq!(report.context.selected.name, "b");
    assert_eq!(report.resources.schema, "sdkexamples-schema-v1");
    assert_eq!(report.resources.schema_version, "1.0.2");
    assert_eq!(report.resources.solution_template_version, "1.0.3");
    assert_eq!(report.resources.solution_template_version_id, template_version_id);
    assert_eq!(report.resources.target, "sdkbox-mk71");

    let configuration = report.configuration.unwrap();
    assert!(configuration.stored);
    assert!(configuration.read_back);
    assert!(configuration.mismatches.is_empty());

    let lifecycle = report.lifecycle.unwrap();
    assert!(lifecycle.reviewed);
    assert!(lifecycle.published);
    assert!(!lifecycle.installed);
    assert_eq!(lifecycle.solution_version_id, "/solutionVersions/sv-1");
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("install"));

    schema_mock.assert();
    schema_version_mock.assert();
    template_mock.assert();
    review_mock.assert();
    publish_mock.assert();

    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_secs(30),
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::from_secs(60),
        ]
    );
}

#[test]
fn empty_selection_uses_fallback_capability() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let config = config(&server, state.path());

    let context_path = edge_path("ctx-rg", "contexts/ctx");
    server.mock(|when, then| {
        when.method(GET).path(context_path.as_str());
        then.status(404).json_body(json!({}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = arm_from_config(&config, &sleeper);
    let versions = MemoryVersionSource::default();
    let mut workflow = Workflow::new(&config, &arm, &versions);

    let outcome = workflow
        .run_context(Some(Capability::new("", "blank")), true)
        .unwrap();
    assert_eq!(outcome.selected.name, "sdkexamples-soap");
    assert!(outcome.capabilities.is_empty());
    assert_eq!(outcome.report.rejected, vec![String::new()]);
    assert_eq!(workflow.warnings().len(), 1);
}

#[test]
fn configuration_read_failure_is_a_warning() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let config = config(&server, state.path());

    let sleeper = Arc::new(RecordingSleeper::default());
    let credential = Arc::new(StaticTokenCredential::failing());
    let arm = ArmClient::from_config(&config, credential.clone())
        .unwrap()
        .with_sleeper(sleeper.clone());
    let versions = MemoryVersionSource::default();
    let mut workflow = Workflow::new(&config, &arm, &versions);

    let outcome = workflow.run_configuration("sdkbox-mk71").unwrap();
    assert!(!outcome.stored);
    assert!(!outcome.read_back);
    assert!(outcome.mismatches.is_empty());
    assert_eq!(outcome.config_name, "sdkbox-mk71Config");
    assert_eq!(workflow.warnings().len(), 2);
    assert!(workflow.warnings()[1].contains("could not be read back"));
    assert!(workflow.warnings()[1].contains("static credential has no token"));

    let lifecycle = workflow.run_lifecycle("sdkbox-mk71", "/solutionTemplates/st/versions/1.0.0");
    assert!(!lifecycle.reviewed);
    assert!(!lifecycle.installed);
    assert!(workflow.warnings().len() > 2);
    assert!(credential.calls() >= 3);
}

#[test]
fn unreachable_configuration_endpoint_is_a_warning() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let mut config = config(&server, state.path());
    config.azure.endpoint = "http://127.0.0.1:1".to_string();

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = arm_from_config(&config, &sleeper);
    let versions = MemoryVersionSource::default();
    let mut workflow = Workflow::new(&config, &arm, &versions);

    let outcome = workflow.run_configuration("sdkbox-mk71").unwrap();
    assert!(!outcome.stored);
    assert!(!outcome.read_back);
    assert!(
        workflow
            .warnings()
            .iter()
            .any(|warning| warning.starts_with("configuration sdkbox-mk71Config could not be read back:"))
    );
}

#[test]
fn capabilities_are_saved_to_the_overridden_file() {
    let server = MockServer::start();
    let state = TempDir::new().unwrap();
    let config = config(&server, state.path());

    let context_path = edge_path("ctx-rg", "contexts/ctx");
    server.mock(|when, then| {
        when.method(GET).path(context_path.as_str());
        then.status(404).json_body(json!({}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = arm_from_config(&config, &sleeper);
    let versions = MemoryVersionSource::default();
    let target = state.path().join("project").join("caps.json");
    let mut workflow = Workflow::new(&config, &arm, &versions)
        .with_capabilities_file(target.clone())
        .with_rng(StdRng::seed_from_u64(3));

    let outcome = workflow.run_context(None, true).unwrap();
    assert_eq!(outcome.saved_to.as_deref(), Some(target.as_path()));
    assert_eq!(capability::load(&target).unwrap(), outcome.capabilities);
    assert!(!config.state.capabilities_file.exists());
}
