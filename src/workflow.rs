//! End-to-end provisioning run.
//!
//! Context first, then schema, schema version, solution template, template
//! version and target, then dynamic configuration and the target lifecycle.
//! Steps after the target treat failures as warnings so one run reports as
//! far as it got.

use std::path::PathBuf;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::arm::ArmClient;
use crate::arm::workload::{
    TargetProperties, WorkloadApi, helm_specification, helm_target_specification,
    render_configurations, render_schema_rules,
};
use crate::capability::{self, Capability, ReconcileReport};
use crate::config::Config;
use crate::dynconfig::{self, ConfigurationClient, Mismatch};
use crate::error::{Result, WoError};
use crate::version::{VersionSource, schema_name, validate_semver, version_label};

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Add this capability instead of generating one.
    pub capability: Option<Capability>,
    pub skip_configuration: bool,
    pub skip_lifecycle: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextOutcome {
    pub context: String,
    pub existing: usize,
    pub capabilities: Vec<Capability>,
    pub report: ReconcileReport,
    pub selected: Capability,
    pub saved_to: Option<PathBuf>,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourcesOutcome {
    pub schema: String,
    pub schema_version: String,
    pub solution_template: String,
    pub solution_template_version: String,
    pub solution_template_version_id: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationOutcome {
    pub config_name: String,
    pub solution: String,
    pub stored: bool,
    pub read_back: bool,
    pub mismatches: Vec<Mismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleOutcome {
    pub solution_version_id: String,
    pub reviewed: bool,
    pub published: bool,
    pub installed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub context: ContextOutcome,
    pub resources: ResourcesOutcome,
    pub configuration: Option<ConfigurationOutcome>,
    pub lifecycle: Option<LifecycleOutcome>,
    pub warnings: Vec<String>,
}

pub struct Workflow<'a> {
    config: &'a Config,
    arm: &'a ArmClient,
    versions: &'a dyn VersionSource,
    capabilities_file: PathBuf,
    rng: StdRng,
    warnings: Vec<String>,
}

impl<'a> Workflow<'a> {
    #[must_use]
    pub fn new(config: &'a Config, arm: &'a ArmClient, versions: &'a dyn VersionSource) -> Self {
        Self {
            config,
            arm,
            versions,
            capabilities_file: config.state.capabilities_file.clone(),
            rng: StdRng::from_os_rng(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Write the reconciled capability list here instead of `state.capabilities_file`.
    #[must_use]
    pub fn with_capabilities_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.capabilities_file = path.into();
        self
    }

    fn api(&self) -> WorkloadApi<'a> {
        WorkloadApi::new(self.arm)
    }

    fn warn(&mut self, message: String) {
        warn!(warning = %message, "continuing after failure");
        self.warnings.push(message);
    }

    /// Warnings collected so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn run(&mut self, options: &WorkflowOptions) -> Result<WorkflowReport> {
        let context = self.run_context(options.capability.clone(), false)?;
        let resources = self.run_resources(&context.selected)?;

        let configuration = if options.skip_configuration {
            None
        } else {
            Some(self.run_configuration(&resources.target)?)
        };

        let lifecycle = if options.skip_lifecycle {
            None
        } else {
            Some(self.run_lifecycle(&resources.target, &resources.solution_template_version_id))
        };

        info!(
            target = %resources.target,
            warnings = self.warnings.len(),
            "workflow finished"
        );
        Ok(WorkflowReport {
            context,
            resources,
            configuration,
            lifecycle,
            warnings: std::mem::take(&mut self.warnings),
        })
    }

    /// Merge a new capability into the context and wait until it is visible.
    pub fn run_context(&mut self, requested: Option<Capability>, dry_run: bool) -> Result<ContextOutcome> {
        let config = self.config;
        let arm = self.arm;
        let settings = &config.context;
        let api = self.api();

        let existing = match api.context_capabilities(&settings.resource_group, &settings.name) {
            Ok(list) => list,
            Err(err) if err.is_remote() => {
                self.warn(format!("could not read context {}: {err}", settings.name));
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        let existing: Vec<Capability> = existing
            .into_iter()
            .map(|cap| {
                if cap.description.is_empty() {
                    let description = format!("Existing capability: {}", cap.name);
                    Capability::new(cap.name, description)
                } else {
                    cap
                }
            })
            .collect();
        info!(context = %settings.name, existing = existing.len(), "fetched context capabilities");

        let incoming = match requested {
            Some(cap) => cap,
            None => capability::generate(
                &mut self.rng,
                &settings.capability_prefix,
                &settings.capability_kinds,
            )?,
        };

        let (merged, report) = capability::reconcile_with_report(&existing, &[incoming])?;
        let selected = match merged.last() {
            Some(cap) => cap.clone(),
            None => {
                self.warn(format!(
                    "no capability selected, using fallback {}",
                    settings.fallback_capability
                ));
                Capability::new(settings.fallback_capability.as_str(), "")
            }
        };

        let path = self.capabilities_file.clone();
        let saved_to = match capability::save(&path, &merged) {
            Ok(()) => Some(path),
            Err(err) => {
                self.warn(format!("could not save {}: {err}", path.display()));
                None
            }
        };

        let mut outcome = ContextOutcome {
            context: settings.name.clone(),
            existing: existing.len(),
            capabilities: merged,
            report,
            selected,
            saved_to,
            updated: false,
        };
        if dry_run {
            return Ok(outcome);
        }

        let policy = config.retry.context.policy()?;
        policy.run_transient(arm.sleeper(), || {
            api.upsert_context(
                &settings.resource_group,
                &settings.name,
                &config.azure.location,
                &outcome.capabilities,
                &settings.hierarchies,
            )
        })?;
        outcome.updated = true;

        info!(wait_secs = settings.propagation_wait.as_secs(), "waiting for context propagation");
        arm.sleeper().sleep(settings.propagation_wait);

        let visible = api.context_capabilities(&settings.resource_group, &settings.name)?;
        if !visible.iter().any(|cap| cap.name == outcome.selected.name) {
            return Err(WoError::Validation(format!(
                "capability {} not present on context {} after update",
                outcome.selected.name, settings.name
            )));
        }
        info!(capability = %outcome.selected.name, "capability verified on context");
        Ok(outcome)
    }

    /// Schema through target, all bound to `capability`.
    pub fn run_resources(&mut self, capability: &Capability) -> Result<ResourcesOutcome> {
        let config = self.config;
        let arm = self.arm;
        let azure = &config.azure;
        let resources = &config.resources;
        let api = self.api();
        let capabilities = vec![capability.name.clone()];

        let schema = schema_name(&resources.name_prefix, self.versions.next()?);
        api.create_schema(&azure.resource_group, &schema, &azure.location)?;

        let schema_version = version_label(self.versions.next()?);
        validate_semver(&schema_version)?;
        let rules = render_schema_rules(&config.configuration.values, &resources.hierarchy_level);
        api.create_schema_version(&azure.resource_group, &schema, &schema_version, &rules)?;

        let template_policy = config.retry.solution_template.policy()?;
        template_policy.run_when(
            arm.sleeper(),
            || {
                api.create_solution_template(
                    &azure.resource_group,
                    &resources.solution_template_name,
                    &azure.location,
                    &resources.solution_template_description,
                    &capabilities,
                )
            },
            WoError::is_remote,
        )?;

        let template_version = version_label(self.versions.next()?);
        validate_semver(&template_version)?;
        let configurations = render_configurations(
            &schema,
            &schema_version,
            &resources.app_name,
            config.configuration.values.keys(),
        );
        let template_version_id = api.create_solution_template_version(
            &azure.resource_group,
            &resources.solution_template_name,
            &template_version,
            configurations,
            helm_specification(&resources.chart),
        )?;

        let custom_location = azure.require_custom_location()?;
        let context_id = api.context_id(&config.context.resource_group, &config.context.name);
        let target_policy = config.retry.target.policy()?;
        target_policy.run_transient(arm.sleeper(), || {
            api.create_target(
                &azure.resource_group,
                &resources.target_name,
                &azure.location,
                custom_location,
                TargetProperties {
                    capabilities: capabilities.clone(),
                    context_id: context_id.clone(),
                    description: resources.target_description.clone(),
                    display_name: resources.target_display_name.clone(),
                    hierarchy_level: resources.hierarchy_level.clone(),
                    solution_scope: "new".to_string(),
                    target_specification: helm_target_specification(),
                },
            )
        })?;

        Ok(ResourcesOutcome {
            schema,
            schema_version,
            solution_template: resources.solution_template_name.clone(),
            solution_template_version: template_version,
            solution_template_version_id: template_version_id,
            target: resources.target_name.clone(),
        })
    }

    /// Store the configured values for `target` and read them back.
    pub fn run_configuration(&mut self, target: &str) -> Result<ConfigurationOutcome> {
        let config = self.config;
        let settings = &config.configuration;
        let client = ConfigurationClient::new(self.arm, settings);
        let config_name = format!("{target}{}", settings.config_name_suffix);
        let solution = config.resources.solution_template_name.clone();
        let resource_group = &config.azure.resource_group;

        let stored = match client.put(resource_group, &config_name, &solution, &settings.values) {
            Ok(()) => true,
            Err(err) => {
                self.warn(format!("could not store configuration {config_name}: {err}"));
                false
            }
        };

        let document = match client.get(resource_group, &config_name, &solution) {
            Ok(Some(document)) => Some(document),
            Ok(None) => {
                self.warn(format!("configuration {config_name} could not be read back"));
                None
            }
            Err(err) => {
                self.warn(format!("configuration {config_name} could not be read back: {err}"));
                None
            }
        };
        let mismatches = document
            .as_ref()
            .map(|document| dynconfig::verify(&settings.values, document))
            .unwrap_or_default();
        for mismatch in &mismatches {
            self.warn(format!(
                "configuration value {} is {:?}, expected {}",
                mismatch.key, mismatch.actual, mismatch.expected
            ));
        }

        Ok(ConfigurationOutcome {
            config_name,
            solution,
            stored,
            read_back: document.is_some(),
            mismatches,
        })
    }

    /// Review, publish and install. Never fails; problems become warnings.
    pub fn run_lifecycle(&mut self, target: &str, template_version_id: &str) -> LifecycleOutcome {
        let config = self.config;
        let arm = self.arm;
        let resource_group = &config.azure.resource_group;
        let api = self.api();
        let policy = match config.retry.lifecycle.policy() {
            Ok(policy) => policy,
            Err(err) => {
                self.warn(format!("lifecycle skipped: {err}"));
                return LifecycleOutcome {
                    solution_version_id: template_version_id.to_string(),
                    reviewed: false,
                    published: false,
                    installed: false,
                };
            }
        };
        let sleeper = arm.sleeper();

        let review = policy.run_transient(sleeper, || {
            api.review_solution_version(resource_group, target, template_version_id)
        });
        let (solution_version_id, reviewed) = match review {
            Ok(id) => (id, true),
            Err(err) => {
                self.warn(format!(
                    "review of {target} failed, using template version id: {err}"
                ));
                (template_version_id.to_string(), false)
            }
        };

        let published = match policy.run_transient(sleeper, || {
            api.publish_solution_version(resource_group, target, &solution_version_id)
        }) {
            Ok(_) => true,
            Err(err) => {
                self.warn(format!("publish on {target} failed: {err}"));
                false
            }
        };

        let installed = match policy.run_transient(sleeper, || {
            api.install_solution(resource_group, target, &solution_version_id)
        }) {
            Ok(_) => true,
            Err(err) => {
                self.warn(format!("install on {target} failed: {err}"));
                false
            }
        };

        LifecycleOutcome {
            solution_version_id,
            reviewed,
            published,
            installed,
        }
    }
}
