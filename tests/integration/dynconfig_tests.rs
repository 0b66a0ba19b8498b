use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;
use wo::WoError;
use wo::config::ConfigurationConfig;
use wo::dynconfig::{ConfigurationClient, render_values};
use wo::test_utils::RecordingSleeper;

use crate::common::{BEARER, client, edge_path};

fn config_path() -> String {
    edge_path(
        "rg",
        "configurations/box1Config/DynamicConfigurations/solution1/versions/version1",
    )
}

#[test]
fn put_sends_rendered_values() {
    let server = MockServer::start();
    let settings = ConfigurationConfig::default();
    let path = config_path();
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path(path.as_str())
            .query_param("api-version", "2024-06-01-preview")
            .header("authorization", BEARER)
            .json_body(json!({
                "properties": {
                    "values": render_values(&settings.values),
                    "provisioningState": "Succeeded"
                }
            }));
        then.status(200).json_body(json!({}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = client(&server, &sleeper);
    ConfigurationClient::new(&arm, &settings)
        .put("rg", "box1Config", "solution1", &settings.values)
        .unwrap();
    mock.assert();
}

#[test]
fn put_failure_is_not_retried() {
    let server = MockServer::start();
    let settings = ConfigurationConfig::default();
    let path = config_path();
    server.mock(|when, then| {
        when.method(PUT).path(path.as_str());
        then.status(503).body("unavailable");
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = client(&server, &sleeper);
    let err = ConfigurationClient::new(&arm, &settings)
        .put("rg", "box1Config", "solution1", &settings.values)
        .unwrap_err();
    assert!(matches!(err, WoError::Remote { status: 503, .. }));
    assert!(sleeper.delays().is_empty());
}

#[test]
fn get_non_200_is_sentinel() {
    let server = MockServer::start();
    let settings = ConfigurationConfig::default();
    let path = config_path();
    server.mock(|when, then| {
        when.method(GET).path(path.as_str());
        then.status(404).json_body(json!({"error": {"code": "NotFound", "message": "no"}}));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = client(&server, &sleeper);
    let stored = ConfigurationClient::new(&arm, &settings)
        .get("rg", "box1Config", "solution1")
        .unwrap();
    assert!(stored.is_none());
}

#[test]
fn get_parses_stored_values() {
    let server = MockServer::start();
    let settings = ConfigurationConfig::default();
    let path = config_path();
    server.mock(|when, then| {
        when.method(GET).path(path.as_str());
        then.status(200).json_body(json!({
            "properties": {
                "values": "ErrorThreshold: 35.3\nEnableLocalLog: true\n",
                "provisioningState": "Succeeded"
            }
        }));
    });

    let sleeper = Arc::new(RecordingSleeper::default());
    let arm = client(&server, &sleeper);
    let stored = ConfigurationClient::new(&arm, &settings)
        .get("rg", "box1Config", "solution1")
        .unwrap()
        .unwrap();
    let values = stored.parsed();
    assert_eq!(values["ErrorThreshold"], "35.3");
    assert_eq!(values["EnableLocalLog"], "true");

    let mismatches = wo::dynconfig::verify(&settings.values, &stored);
    assert_eq!(mismatches.len(), settings.values.len() - 2);
    assert!(mismatches.iter().all(|m| m.actual.is_none()));
}
