//! Typed request bodies and calls for workload-orchestration resources.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use super::client::ArmClient;
use crate::capability::Capability;
use crate::config::{ChartConfig, Hierarchy};
use crate::dynconfig::ConfigValue;
use crate::error::{Result, WoError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedResource<P> {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_location: Option<ExtendedLocation>,
    pub properties: P,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendedLocation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ExtendedLocation {
    pub fn custom_location(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "CustomLocation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaProperties {}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaVersionBody {
    pub properties: SchemaVersionProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaVersionProperties {
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolutionTemplateProperties {
    pub capabilities: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionTemplateVersionRequest {
    pub solution_template_version: SolutionTemplateVersionBody,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolutionTemplateVersionBody {
    pub properties: SolutionTemplateVersionProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionTemplateVersionProperties {
    pub configurations: String,
    pub specification: Value,
    pub orchestrator_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextProperties {
    pub capabilities: Vec<Capability>,
    pub hierarchies: Vec<Hierarchy>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProperties {
    pub capabilities: Vec<String>,
    pub context_id: String,
    pub description: String,
    pub display_name: String,
    pub hierarchy_level: String,
    pub solution_scope: String,
    pub target_specification: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub solution_dependencies: Vec<Value>,
    pub solution_instance_name: String,
    pub solution_template_version_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionVersionRequest {
    pub solution_version_id: String,
}

/// `id` of an ARM resource document.
#[must_use]
pub fn resource_id(resource: &Value) -> Option<&str> {
    resource.get("id").and_then(Value::as_str)
}

/// `name` of an ARM resource document.
#[must_use]
pub fn resource_name(resource: &Value) -> Option<&str> {
    resource.get("name").and_then(Value::as_str)
}

/// YAML rules for a schema version, one entry per configured value.
#[must_use]
pub fn render_schema_rules(values: &BTreeMap<String, ConfigValue>, editable_at: &str) -> String {
    let mut out = String::from("rules:\n  configs:\n");
    for (key, value) in values {
        let _ = write!(
            out,
            "    {key}:\n      type: {}\n      required: true\n      editableAt:\n        - {editable_at}\n      editableBy:\n        - OT\n",
            value.type_name()
        );
    }
    out
}

/// Configuration text binding template keys to schema values.
#[must_use]
pub fn render_configurations<'a>(
    schema_name: &str,
    schema_version: &str,
    app_name: &str,
    keys: impl IntoIterator<Item = &'a String>,
) -> String {
    let mut out = format!(
        "schema:\n  name: {schema_name}\n  version: {schema_version}\nconfigs:\n  AppName: {app_name}\n"
    );
    for key in keys {
        let _ = writeln!(out, "  {key}: ${{{{$val({key})}}}}");
    }
    out
}

/// Single helm.v3 component deploying `chart`.
#[must_use]
pub fn helm_specification(chart: &ChartConfig) -> Value {
    json!({
        "components": [{
            "name": "helmcomponent",
            "type": "helm.v3",
            "properties": {
                "chart": {
                    "repo": chart.repo,
                    "version": chart.version,
                    "wait": chart.wait,
                    "timeout": chart.timeout,
                }
            }
        }]
    })
}

/// In-cluster helm binding for a target.
#[must_use]
pub fn helm_target_specification() -> Value {
    json!({
        "topologies": [{
            "bindings": [{
                "role": "helm.v3",
                "provider": "providers.target.helm",
                "config": { "inCluster": "true" }
            }]
        }]
    })
}

/// Calls against `Microsoft.Edge` resources.
pub struct WorkloadApi<'a> {
    arm: &'a ArmClient,
}

impl<'a> WorkloadApi<'a> {
    #[must_use]
    pub const fn new(arm: &'a ArmClient) -> Self {
        Self { arm }
    }

    #[must_use]
    pub fn context_id(&self, resource_group: &str, name: &str) -> String {
        self.arm.edge_id(resource_group, &format!("contexts/{name}"))
    }

    pub fn create_schema(&self, resource_group: &str, name: &str, location: &str) -> Result<Value> {
        let body = TrackedResource {
            location: location.to_string(),
            extended_location: None,
            properties: SchemaProperties::default(),
        };
        let path = self.arm.edge_id(resource_group, &format!("schemas/{name}"));
        let created = self.arm.put(&path, &serde_json::to_value(body)?)?;
        info!(schema = name, "schema created");
        Ok(created)
    }

    pub fn create_schema_version(
        &self,
        resource_group: &str,
        schema: &str,
        version: &str,
        rules: &str,
    ) -> Result<Value> {
        let body = SchemaVersionBody {
            properties: SchemaVersionProperties {
                value: rules.to_string(),
            },
        };
        let path = self
            .arm
            .edge_id(resource_group, &format!("schemas/{schema}/versions/{version}"));
        let created = self.arm.put(&path, &serde_json::to_value(body)?)?;
        info!(schema, version, "schema version created");
        Ok(created)
    }

    pub fn create_solution_template(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
        description: &str,
        capabilities: &[String],
    ) -> Result<Value> {
        let body = TrackedResource {
            location: location.to_string(),
            extended_location: None,
            properties: SolutionTemplateProperties {
                capabilities: capabilities.to_vec(),
                description: description.to_string(),
            },
        };
        let path = self
            .arm
            .edge_id(resource_group, &format!("solutionTemplates/{name}"));
        let created = self.arm.put(&path, &serde_json::to_value(body)?)?;
        info!(template = name, "solution template created");
        Ok(created)
    }

    /// Create a template version and return its resource id.
    pub fn create_solution_template_version(
        &self,
        resource_group: &str,
        template: &str,
        version: &str,
        configurations: String,
        specification: Value,
    ) -> Result<String> {
        let body = SolutionTemplateVersionRequest {
            solution_template_version: SolutionTemplateVersionBody {
                properties: SolutionTemplateVersionProperties {
                    configurations,
                    specification,
                    orchestrator_type: "TO".to_string(),
                },
            },
            version: version.to_string(),
        };
        let template_path = self
            .arm
            .edge_id(resource_group, &format!("solutionTemplates/{template}"));
        let result = self.arm.post(
            &format!("{template_path}/createVersion"),
            &serde_json::to_value(body)?,
        )?;
        let id = resource_id(&result)
            .map_or_else(|| format!("{template_path}/versions/{version}"), ToString::to_string);
        info!(template, version, id = %id, "solution template version created");
        Ok(id)
    }

    pub fn get_context(&self, resource_group: &str, name: &str) -> Result<Option<Value>> {
        self.arm.get(&self.context_id(resource_group, name))
    }

    /// Capabilities currently on a context; a missing context has none.
    pub fn context_capabilities(&self, resource_group: &str, name: &str) -> Result<Vec<Capability>> {
        let Some(context) = self.get_context(resource_group, name)? else {
            return Ok(Vec::new());
        };
        match context.pointer("/properties/capabilities") {
            Some(list) if !list.is_null() => Capability::list_from_value(list),
            _ => Ok(Vec::new()),
        }
    }

    pub fn upsert_context(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
        capabilities: &[Capability],
        hierarchies: &[Hierarchy],
    ) -> Result<Value> {
        let body = TrackedResource {
            location: location.to_string(),
            extended_location: None,
            properties: ContextProperties {
                capabilities: capabilities.to_vec(),
                hierarchies: hierarchies.to_vec(),
            },
        };
        let updated = self
            .arm
            .put(&self.context_id(resource_group, name), &serde_json::to_value(body)?)?;
        info!(context = name, capabilities = capabilities.len(), "context updated");
        Ok(updated)
    }

    pub fn create_target(
        &self,
        resource_group: &str,
        name: &str,
        location: &str,
        custom_location: &str,
        properties: TargetProperties,
    ) -> Result<Value> {
        let body = TrackedResource {
            location: location.to_string(),
            extended_location: Some(ExtendedLocation::custom_location(custom_location)),
            properties,
        };
        let path = self.arm.edge_id(resource_group, &format!("targets/{name}"));
        let created = self.arm.put(&path, &serde_json::to_value(body)?)?;
        info!(target = name, "target created");
        Ok(created)
    }

    pub fn get_target(&self, resource_group: &str, name: &str) -> Result<Option<Value>> {
        self.arm
            .get(&self.arm.edge_id(resource_group, &format!("targets/{name}")))
    }

    /// Review a template version on a target and return the solution version id.
    pub fn review_solution_version(
        &self,
        resource_group: &str,
        target: &str,
        template_version_id: &str,
    ) -> Result<String> {
        let body = ReviewRequest {
            solution_dependencies: Vec::new(),
            solution_instance_name: target.to_string(),
            solution_template_version_id: template_version_id.to_string(),
        };
        let result = self.target_action(resource_group, target, "reviewSolutionVersion", &serde_json::to_value(body)?)?;
        let id = resource_id(&result).ok_or_else(|| {
            WoError::Validation(format!("review of {target} returned no solution version id"))
        })?;
        info!(target, solution_version = id, "review completed");
        Ok(id.to_string())
    }

    pub fn publish_solution_version(
        &self,
        resource_group: &str,
        target: &str,
        solution_version_id: &str,
    ) -> Result<Value> {
        let body = SolutionVersionRequest {
            solution_version_id: solution_version_id.to_string(),
        };
        let result = self.target_action(resource_group, target, "publishSolutionVersion", &serde_json::to_value(body)?)?;
        info!(target, solution_version = solution_version_id, "published");
        Ok(result)
    }

    pub fn install_solution(
        &self,
        resource_group: &str,
        target: &str,
        solution_version_id: &str,
    ) -> Result<Value> {
        let body = SolutionVersionRequest {
            solution_version_id: solution_version_id.to_string(),
        };
        let result = self.target_action(resource_group, target, "installSolution", &serde_json::to_value(body)?)?;
        info!(target, solution_version = solution_version_id, "installed");
        Ok(result)
    }

    fn target_action(&self, resource_group: &str, target: &str, action: &str, body: &Value) -> Result<Value> {
        let path = self
            .arm
            .edge_id(resource_group, &format!("targets/{target}/{action}"));
        self.arm.post(&path, body)
    }
}
