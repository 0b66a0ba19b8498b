//! Dynamic configuration values for a deployed solution.
//!
//! Values travel as a single text blob of `key: value` lines inside a JSON
//! envelope. Reads that do not come back with HTTP 200 yield `None` so a
//! caller can carry on without the stored document.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::arm::ArmClient;
use crate::arm::client::remote_error;
use crate::config::ConfigurationConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    /// Schema type name for this value.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Parse a command-line value, picking the narrowest type that fits.
    #[must_use]
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::Integer(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return Self::Float(value);
            }
        }
        Self::String(trimmed.to_string())
    }

    /// Whether a stored raw value means the same thing.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        let raw = raw.trim();
        match self {
            Self::Bool(value) => raw.eq_ignore_ascii_case(if *value { "true" } else { "false" }),
            Self::Integer(value) => raw.parse::<i64>().is_ok_and(|stored| stored == *value),
            Self::Float(value) => raw
                .parse::<f64>()
                .is_ok_and(|stored| (stored - value).abs() <= f64::EPSILON * value.abs().max(1.0)),
            Self::String(value) => raw == value,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) if value.fract() == 0.0 => write!(f, "{value:.1}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

/// `key: value` lines, each newline terminated.
#[must_use]
pub fn render_values(values: &BTreeMap<String, ConfigValue>) -> String {
    values
        .iter()
        .map(|(key, value)| format!("{key}: {value}\n"))
        .collect()
}

/// Split `key: value` lines back into raw strings. Lines without a colon are ignored.
#[must_use]
pub fn parse_values(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Configuration document as stored by the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct StoredConfiguration {
    pub values: String,
    pub provisioning_state: Option<String>,
}

impl StoredConfiguration {
    fn from_document(document: &Value) -> Self {
        Self {
            values: document
                .pointer("/properties/values")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            provisioning_state: document
                .pointer("/properties/provisioningState")
                .and_then(Value::as_str)
                .map(ToString::to_string),
        }
    }

    #[must_use]
    pub fn parsed(&self) -> BTreeMap<String, String> {
        parse_values(&self.values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub key: String,
    pub expected: String,
    pub actual: Option<String>,
}

/// Compare requested values with what was stored.
#[must_use]
pub fn verify(expected: &BTreeMap<String, ConfigValue>, stored: &StoredConfiguration) -> Vec<Mismatch> {
    let actual = stored.parsed();
    expected
        .iter()
        .filter_map(|(key, value)| {
            let found = actual.get(key);
            if found.is_some_and(|raw| value.matches(raw)) {
                None
            } else {
                Some(Mismatch {
                    key: key.clone(),
                    expected: value.to_string(),
                    actual: found.cloned(),
                })
            }
        })
        .collect()
}

/// Reads and writes one dynamic configuration version.
pub struct ConfigurationClient<'a> {
    arm: &'a ArmClient,
    api_version: String,
    version_name: String,
}

impl<'a> ConfigurationClient<'a> {
    #[must_use]
    pub fn new(arm: &'a ArmClient, settings: &ConfigurationConfig) -> Self {
        Self {
            arm,
            api_version: settings.api_version.clone(),
            version_name: settings.version_name.clone(),
        }
    }

    fn path(&self, resource_group: &str, config_name: &str, solution: &str) -> String {
        self.arm.edge_id(
            resource_group,
            &format!(
                "configurations/{config_name}/DynamicConfigurations/{solution}/versions/{}",
                self.version_name
            ),
        )
    }

    /// Store `values`. Any non-2xx answer is an error; nothing is retried.
    pub fn put(
        &self,
        resource_group: &str,
        config_name: &str,
        solution: &str,
        values: &BTreeMap<String, ConfigValue>,
    ) -> Result<()> {
        let path = self.path(resource_group, config_name, solution);
        let body = json!({
            "properties": {
                "values": render_values(values),
                "provisioningState": "Succeeded",
            }
        });
        let response = self
            .arm
            .send(Method::PUT, &path, &self.api_version, Some(&body))?;
        if !response.is_success() {
            return Err(remote_error(response.status, &response.body));
        }
        info!(config = config_name, solution, count = values.len(), "configuration stored");
        Ok(())
    }

    /// Fetch the stored document; anything but HTTP 200 is `None`.
    pub fn get(
        &self,
        resource_group: &str,
        config_name: &str,
        solution: &str,
    ) -> Result<Option<StoredConfiguration>> {
        let path = self.path(resource_group, config_name, solution);
        let response = self.arm.send(Method::GET, &path, &self.api_version, None)?;
        if response.status != 200 {
            warn!(
                config = config_name,
                solution,
                status = response.status,
                body = %response.body,
                "configuration read did not return 200"
            );
            return Ok(None);
        }
        Ok(Some(StoredConfiguration::from_document(&response.body)))
    }
}
