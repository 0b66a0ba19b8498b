//! wo configure - Dynamic configuration values for a target's solution

use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok, robot_with_warnings};
use crate::dynconfig::{self, ConfigValue, ConfigurationClient, Mismatch, StoredConfiguration};
use crate::error::{Result, WoError};

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    #[command(subcommand)]
    pub command: ConfigureCommand,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigTarget {
    /// Target name (defaults to resources.target_name)
    #[arg(long)]
    pub target: Option<String>,

    /// Solution name (defaults to resources.solution_template_name)
    #[arg(long)]
    pub solution: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigureCommand {
    /// Store values (the configured defaults unless --value is given)
    Set {
        #[command(flatten)]
        target: ConfigTarget,

        /// KEY=VALUE pair; repeatable
        #[arg(long = "value", value_name = "KEY=VALUE")]
        values: Vec<String>,
    },
    /// Read stored values and compare them with the configured defaults
    Get {
        #[command(flatten)]
        target: ConfigTarget,
    },
}

#[derive(Serialize)]
struct SetReport {
    config_name: String,
    solution: String,
    values: BTreeMap<String, ConfigValue>,
}

#[derive(Serialize)]
struct GetReport {
    config_name: String,
    solution: String,
    found: bool,
    stored: Option<StoredConfiguration>,
    values: BTreeMap<String, String>,
    mismatches: Vec<Mismatch>,
}

/// Parse `KEY=VALUE` pairs into typed values.
pub fn parse_assignments(raw: &[String]) -> Result<BTreeMap<String, ConfigValue>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                WoError::Validation(format!("expected KEY=VALUE, got {pair:?}"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(WoError::Validation(format!("empty key in {pair:?}")));
            }
            Ok((key.to_string(), ConfigValue::infer(value)))
        })
        .collect()
}

fn names(ctx: &AppContext, target: &ConfigTarget) -> (String, String) {
    let target_name = target
        .target
        .clone()
        .unwrap_or_else(|| ctx.config.resources.target_name.clone());
    let solution = target
        .solution
        .clone()
        .unwrap_or_else(|| ctx.config.resources.solution_template_name.clone());
    (
        format!("{target_name}{}", ctx.config.configuration.config_name_suffix),
        solution,
    )
}

pub fn run(ctx: &AppContext, args: &ConfigureArgs) -> Result<()> {
    let arm = ctx.arm_client()?;
    let client = ConfigurationClient::new(&arm, &ctx.config.configuration);
    let resource_group = &ctx.config.azure.resource_group;

    match &args.command {
        ConfigureCommand::Set { target, values } => {
            let (config_name, solution) = names(ctx, target);
            let values = if values.is_empty() {
                ctx.config.configuration.values.clone()
            } else {
                parse_assignments(values)?
            };
            client.put(resource_group, &config_name, &solution, &values)?;

            let report = SetReport {
                config_name,
                solution,
                values,
            };
            if ctx.wants_json() {
                return emit_robot(&robot_ok(report));
            }
            let mut layout = HumanLayout::new();
            layout.title(&format!("Stored {}", report.config_name));
            for (key, value) in &report.values {
                layout.kv(key, &value.to_string());
            }
            emit_human(&layout);
            Ok(())
        }
        ConfigureCommand::Get { target } => {
            let (config_name, solution) = names(ctx, target);
            let stored = client.get(resource_group, &config_name, &solution)?;
            let mismatches = stored
                .as_ref()
                .map(|doc| dynconfig::verify(&ctx.config.configuration.values, doc))
                .unwrap_or_default();
            let report = GetReport {
                config_name,
                solution,
                found: stored.is_some(),
                values: stored.as_ref().map(StoredConfiguration::parsed).unwrap_or_default(),
                stored,
                mismatches,
            };

            if ctx.wants_json() {
                let warnings = report
                    .mismatches
                    .iter()
                    .map(|m| format!("{} differs from the configured value", m.key))
                    .collect();
                return emit_robot(&robot_with_warnings(report, warnings));
            }

            let mut layout = HumanLayout::new();
            if !report.found {
                layout.title(&format!("{} could not be read", report.config_name));
                emit_human(&layout);
                return Ok(());
            }
            layout.title(&report.config_name);
            for (key, value) in &report.values {
                layout.kv(key, value);
            }
            if !report.mismatches.is_empty() {
                layout.section("Differs from configured values");
                for mismatch in &report.mismatches {
                    layout.bullet(&format!(
                        "{}: expected {}, stored {}",
                        mismatch.key,
                        mismatch.expected,
                        mismatch.actual.as_deref().unwrap_or("(missing)")
                    ));
                }
            }
            emit_human(&layout);
            Ok(())
        }
    }
}
