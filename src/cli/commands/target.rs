//! wo target - Solution lifecycle on a target

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::AppContext;
use crate::arm::WorkloadApi;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Target name (defaults to resources.target_name)
    #[arg(long, global = true)]
    pub target: Option<String>,

    #[command(subcommand)]
    pub command: TargetCommand,
}

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// Review a solution template version and print the solution version id
    Review {
        /// Solution template version resource id
        template_version_id: String,
    },
    /// Publish a reviewed solution version
    Publish {
        /// Solution version resource id
        solution_version_id: String,
    },
    /// Install a published solution version
    Install {
        /// Solution version resource id
        solution_version_id: String,
    },
}

#[derive(Serialize)]
struct TargetReport {
    target: String,
    action: &'static str,
    solution_version_id: String,
}

pub fn run(ctx: &AppContext, args: &TargetArgs) -> Result<()> {
    let arm = ctx.arm_client()?;
    let api = WorkloadApi::new(&arm);
    let policy = ctx.config.retry.lifecycle.policy()?;
    let resource_group = &ctx.config.azure.resource_group;
    let target = args
        .target
        .clone()
        .unwrap_or_else(|| ctx.config.resources.target_name.clone());

    let report = match &args.command {
        TargetCommand::Review {
            template_version_id,
        } => {
            let id = policy.run_transient(arm.sleeper(), || {
                api.review_solution_version(resource_group, &target, template_version_id)
            })?;
            TargetReport {
                target,
                action: "review",
                solution_version_id: id,
            }
        }
        TargetCommand::Publish {
            solution_version_id,
        } => {
            policy.run_transient(arm.sleeper(), || {
                api.publish_solution_version(resource_group, &target, solution_version_id)
            })?;
            TargetReport {
                target,
                action: "publish",
                solution_version_id: solution_version_id.clone(),
            }
        }
        TargetCommand::Install {
            solution_version_id,
        } => {
            policy.run_transient(arm.sleeper(), || {
                api.install_solution(resource_group, &target, solution_version_id)
            })?;
            TargetReport {
                target,
                action: "install",
                solution_version_id: solution_version_id.clone(),
            }
        }
    };

    if ctx.wants_json() {
        return emit_robot(&robot_ok(report));
    }
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("{} on {} succeeded", report.action, report.target))
        .kv("Solution version", &report.solution_version_id);
    emit_human(&layout);
    Ok(())
}
