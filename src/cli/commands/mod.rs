//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod auth;
pub mod completions;
pub mod configure;
pub mod context;
pub mod reconcile;
pub mod run;
pub mod target;
pub mod version;

use crate::app::AppContext;
use crate::error::Result;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run::run(ctx, args),
        Commands::Context(args) => context::run(ctx, args),
        Commands::Reconcile(args) => reconcile::run(ctx, args),
        Commands::Configure(args) => configure::run(ctx, args),
        Commands::Target(args) => target::run(ctx, args),
        Commands::Version(args) => version::run(ctx, args),
        Commands::Auth(args) => auth::run(ctx, args),
        Commands::Completions(args) => completions::run(args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision context, schema, template and target, then configure and install
    Run(run::RunArgs),

    /// Merge a capability into the context and push it
    Context(context::ContextArgs),

    /// Reconcile two capability files offline
    Reconcile(reconcile::ReconcileArgs),

    /// Set or read dynamic configuration values
    Configure(configure::ConfigureArgs),

    /// Review, publish or install a solution on a target
    Target(target::TargetArgs),

    /// Advance or inspect the resource version counter
    Version(version::VersionArgs),

    /// Check that a credential source can produce a token
    Auth(auth::AuthArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}
