//! wo reconcile - Merge two capability files without touching the control plane

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::capability::{self, Capability, ReconcileReport};
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// JSON array of capabilities already present
    #[arg(long)]
    pub existing: PathBuf,

    /// JSON array of capabilities to add
    #[arg(long)]
    pub incoming: PathBuf,

    /// Write the merged list here
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReconcileOutput {
    capabilities: Vec<Capability>,
    report: ReconcileReport,
    written_to: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &ReconcileArgs) -> Result<()> {
    let existing = capability::load(&args.existing)?;
    let incoming = capability::load(&args.incoming)?;
    let (merged, report) = capability::reconcile_with_report(&existing, &incoming)?;

    if let Some(path) = &args.output {
        capability::save(path, &merged)?;
    }

    let output = ReconcileOutput {
        capabilities: merged,
        report,
        written_to: args.output.clone(),
    };

    if ctx.wants_json() {
        return emit_robot(&robot_ok(output));
    }

    let mut layout = HumanLayout::new();
    layout.title(&format!("{} capabilities", output.capabilities.len()));
    for cap in &output.capabilities {
        let marker = if output.report.added.contains(&cap.name) {
            "+".green().to_string()
        } else {
            " ".to_string()
        };
        layout.bullet(&format!("{marker} {} {}", cap.name.bold(), cap.description.dimmed()));
    }
    if !output.report.rejected.is_empty() {
        layout.section("Rejected");
        for name in &output.report.rejected {
            layout.bullet(if name.is_empty() { "(empty name)" } else { name.as_str() });
        }
    }
    if let Some(path) = &output.written_to {
        layout.section("Output").kv("Written to", &path.display().to_string());
    }
    emit_human(&layout);
    Ok(())
}
