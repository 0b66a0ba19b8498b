//! wo run - Full provisioning workflow

use clap::Args;

use crate::app::AppContext;
use crate::capability::Capability;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_with_warnings};
use crate::error::Result;
use crate::workflow::{Workflow, WorkflowOptions, WorkflowReport};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Add this capability instead of a generated one
    #[arg(long)]
    pub capability: Option<String>,

    /// Description for --capability
    #[arg(long, requires = "capability")]
    pub description: Option<String>,

    /// Skip storing and verifying dynamic configuration
    #[arg(long)]
    pub skip_configuration: bool,

    /// Skip review, publish and install
    #[arg(long)]
    pub skip_lifecycle: bool,
}

pub fn run(ctx: &AppContext, args: &RunArgs) -> Result<()> {
    let arm = ctx.arm_client()?;
    let versions = ctx.version_source();
    let options = WorkflowOptions {
        capability: args.capability.as_ref().map(|name| {
            Capability::new(name.as_str(), args.description.clone().unwrap_or_default())
        }),
        skip_configuration: args.skip_configuration,
        skip_lifecycle: args.skip_lifecycle,
    };

    let mut report = Workflow::new(&ctx.config, &arm, &versions)
        .with_capabilities_file(ctx.capabilities_path())
        .run(&options)?;

    if ctx.wants_json() {
        let warnings = std::mem::take(&mut report.warnings);
        return emit_robot(&robot_with_warnings(report, warnings));
    }
    emit_human(&render(&report));
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn render(report: &WorkflowReport) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout
        .title("Workflow complete")
        .section("Context")
        .kv("Context", &report.context.context)
        .kv("Capability", &report.context.selected.name)
        .kv("Capabilities", &report.context.capabilities.len().to_string())
        .section("Resources")
        .kv("Schema", &format!("{} {}", report.resources.schema, report.resources.schema_version))
        .kv(
            "Solution template",
            &format!(
                "{} {}",
                report.resources.solution_template, report.resources.solution_template_version
            ),
        )
        .kv("Target", &report.resources.target);

    if let Some(configuration) = &report.configuration {
        layout
            .section("Configuration")
            .kv("Name", &configuration.config_name)
            .kv("Stored", yes_no(configuration.stored))
            .kv("Read back", yes_no(configuration.read_back))
            .kv("Mismatches", &configuration.mismatches.len().to_string());
    }
    if let Some(lifecycle) = &report.lifecycle {
        layout
            .section("Lifecycle")
            .kv("Solution version", &lifecycle.solution_version_id)
            .kv("Reviewed", yes_no(lifecycle.reviewed))
            .kv("Published", yes_no(lifecycle.published))
            .kv("Installed", yes_no(lifecycle.installed));
    }
    layout.warnings(&report.warnings);
    layout
}
