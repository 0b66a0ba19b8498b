//! wo version - Persisted resource version counter

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::version::{VersionSource, schema_name, version_label};

#[derive(Args, Debug)]
pub struct VersionArgs {
    #[command(subcommand)]
    pub command: VersionCommand,
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    /// Advance the counter and print the new value
    Next,
    /// Print the current value without advancing
    Show,
}

#[derive(Serialize)]
struct VersionReport {
    file: String,
    value: u64,
    schema_name: String,
    version_label: String,
}

pub fn run(ctx: &AppContext, args: &VersionArgs) -> Result<()> {
    let source = ctx.version_source();
    let value = match args.command {
        VersionCommand::Next => source.next()?,
        VersionCommand::Show => source.current()?,
    };

    let report = VersionReport {
        file: source.path().display().to_string(),
        value,
        schema_name: schema_name(&ctx.config.resources.name_prefix, value),
        version_label: version_label(value),
    };

    if ctx.wants_json() {
        return emit_robot(&robot_ok(report));
    }

    let mut layout = HumanLayout::new();
    layout
        .kv("File", &report.file)
        .kv("Value", &report.value.to_string())
        .kv("Schema name", &report.schema_name)
        .kv("Version label", &report.version_label);
    emit_human(&layout);
    Ok(())
}
