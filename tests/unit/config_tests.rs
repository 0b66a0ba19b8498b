use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use wo::WoError;
use wo::config::{Config, DEFAULT_ENDPOINT};
use wo::dynconfig::ConfigValue;
use wo::test_utils::fixtures::UnitTestFixture;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/wo.toml")
}

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn fixture_document_overrides_defaults() {
    let raw = std::fs::read_to_string(fixture_path()).unwrap();
    let config = Config::from_toml(&raw).unwrap();

    assert_eq!(
        config.azure.subscription_id.as_deref(),
        Some("11111111-2222-3333-4444-555555555555")
    );
    assert_eq!(config.azure.resource_group, "factory-rg");
    assert_eq!(config.azure.location, "westus3");
    assert_eq!(config.azure.endpoint, DEFAULT_ENDPOINT);

    assert_eq!(config.context.name, "Plant-Context");
    assert_eq!(config.context.capability_kinds, vec!["glue", "label"]);
    assert_eq!(config.context.propagation_wait, Duration::from_secs(45));
    let levels: Vec<&str> = config
        .context
        .hierarchies
        .iter()
        .map(|h| h.name.as_str())
        .collect();
    assert_eq!(levels, vec!["site", "line"]);

    assert_eq!(config.resources.target_name, "line-7");
    assert_eq!(config.resources.solution_template_name, "sdkexamples-solution1");

    assert_eq!(config.retry.target.max_attempts, 7);
    assert_eq!(config.retry.target.initial_delay, Duration::from_secs(120));
    assert_eq!(config.retry.context.max_attempts, 3);

    assert_eq!(config.polling.interval, Duration::from_secs(10));
    assert_eq!(config.polling.max_polls, 30);
    assert_eq!(config.auth.sources, vec!["azure_cli"]);
}

#[test]
fn configuration_values_replace_the_default_set() {
    let raw = std::fs::read_to_string(fixture_path()).unwrap();
    let config = Config::from_toml(&raw).unwrap();
    let values = &config.configuration.values;

    assert_eq!(values.len(), 3);
    assert_eq!(values["ErrorThreshold"], ConfigValue::Integer(40));
    assert_eq!(values["EnableLocalLog"], ConfigValue::Bool(false));
    assert_eq!(
        values["ApplicationEndpoint"],
        ConfigValue::String("http://localhost:9090/app".to_string())
    );
    assert_eq!(config.configuration.version_name, "version2");
}

#[test]
fn environment_wins_over_file() {
    let fixture = UnitTestFixture::new();
    let path = fixture.create_config("http://127.0.0.1:1", "[polling]\nmax_polls = 9\n");
    let env = lookup(&[
        ("WO_RESOURCE_GROUP", "from-env"),
        ("WO_POLL_MAX_POLLS", "4"),
        ("WO_AUTH_SOURCES", "environment, azure_cli"),
        ("WO_CONTEXT_PROPAGATION_WAIT", "1m 30s"),
    ]);

    let config = Config::load_with_env(Some(path.as_path()), &fixture.data_path, &env).unwrap();
    assert_eq!(config.azure.resource_group, "from-env");
    assert_eq!(config.azure.endpoint, "http://127.0.0.1:1");
    assert_eq!(config.polling.max_polls, 4);
    assert_eq!(config.auth.sources, vec!["environment", "azure_cli"]);
    assert_eq!(config.context.propagation_wait, Duration::from_secs(90));
}

#[test]
fn project_file_is_read_from_root() {
    let fixture = UnitTestFixture::new();
    let _ = fixture.create_file("wo.toml", "[resources]\ntarget_name = \"from-project\"\n");

    let config = Config::load_with_env(None, &fixture.data_path, &lookup(&[])).unwrap();
    assert_eq!(config.resources.target_name, "from-project");
}

#[test]
fn missing_explicit_file_keeps_defaults() {
    let fixture = UnitTestFixture::new();
    let config = Config::load_with_env(
        Some(fixture.path("nope.toml").as_path()),
        &fixture.data_path,
        &lookup(&[]),
    )
    .unwrap();
    assert_eq!(config.resources.target_name, "sdkbox-mk71");
    assert!(config.azure.subscription_id.is_none());
    assert!(matches!(
        config.azure.require_subscription(),
        Err(WoError::MissingConfig(_))
    ));
}

#[test]
fn bad_environment_values_are_config_errors() {
    let fixture = UnitTestFixture::new();
    let cases = [
        ("WO_POLL_MAX_POLLS", "many"),
        ("WO_POLL_INTERVAL", "soon"),
        ("WO_AUTH_SOURCES", "kerberos"),
    ];
    for (key, value) in cases {
        let err = Config::load_with_env(
            Some(fixture.path("nope.toml").as_path()),
            &fixture.data_path,
            &lookup(&[(key, value)]),
        )
        .unwrap_err();
        assert!(matches!(err, WoError::Config(_)), "{key}={value} gave {err}");
    }
}

#[test]
fn malformed_file_is_config_error() {
    let fixture = UnitTestFixture::new();
    let path = fixture.create_file("broken.toml", "[azure\nlocation = ");
    let err = Config::load_with_env(Some(path.as_path()), &fixture.data_path, &lookup(&[])).unwrap_err();
    assert!(matches!(err, WoError::Config(ref msg) if msg.contains("broken.toml")));
}
