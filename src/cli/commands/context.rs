//! wo context - Reconcile and push context capabilities

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::capability::Capability;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_with_warnings};
use crate::error::Result;
use crate::version::MemoryVersionSource;
use crate::workflow::Workflow;

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Capability to add instead of a generated one
    #[arg(long)]
    pub capability: Option<String>,

    /// Description for --capability
    #[arg(long, requires = "capability")]
    pub description: Option<String>,

    /// Reconcile and save locally, but do not update the context
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(ctx: &AppContext, args: &ContextArgs) -> Result<()> {
    let arm = ctx.arm_client()?;
    // The context step never names versioned resources.
    let versions = MemoryVersionSource::default();
    let requested = args.capability.as_ref().map(|name| {
        Capability::new(name.as_str(), args.description.clone().unwrap_or_default())
    });

    let mut workflow = Workflow::new(&ctx.config, &arm, &versions)
        .with_capabilities_file(ctx.capabilities_path());
    let outcome = workflow.run_context(requested, args.dry_run)?;
    let warnings = workflow.warnings().to_vec();

    if ctx.wants_json() {
        return emit_robot(&robot_with_warnings(outcome, warnings));
    }

    let mut layout = HumanLayout::new();
    let title = if outcome.updated {
        format!("Context {} updated", outcome.context)
    } else {
        format!("Context {} (dry run)", outcome.context)
    };
    layout
        .title(&title)
        .kv("Selected", &outcome.selected.name)
        .kv("Existing", &outcome.existing.to_string());
    if let Some(path) = &outcome.saved_to {
        layout.kv("Saved to", &path.display().to_string());
    }
    layout.section("Capabilities");
    for cap in &outcome.capabilities {
        let name = if cap.name == outcome.selected.name {
            cap.name.green().bold().to_string()
        } else {
            cap.name.clone()
        };
        layout.bullet(&name);
    }
    layout.warnings(&warnings);
    emit_human(&layout);
    Ok(())
}
