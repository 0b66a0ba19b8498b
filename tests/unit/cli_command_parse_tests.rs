use clap::Parser;

use wo::cli::commands::configure::ConfigureCommand;
use wo::cli::commands::target::TargetCommand;
use wo::cli::commands::version::VersionCommand;
use wo::cli::commands::configure::parse_assignments;
use wo::cli::{Cli, Commands, OutputFormat};
use wo::dynconfig::ConfigValue;

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["wo"];
    argv.extend_from_slice(args);
    Cli::parse_from(argv).command
}

#[test]
fn parse_run_flags() {
    match parse(&[
        "run",
        "--capability",
        "sdkexamples-soap-12",
        "--description",
        "Soap",
        "--skip-lifecycle",
    ]) {
        Commands::Run(args) => {
            assert_eq!(args.capability.as_deref(), Some("sdkexamples-soap-12"));
            assert_eq!(args.description.as_deref(), Some("Soap"));
            assert!(args.skip_lifecycle);
            assert!(!args.skip_configuration);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn description_requires_capability() {
    assert!(Cli::try_parse_from(["wo", "run", "--description", "orphan"]).is_err());
    assert!(Cli::try_parse_from(["wo", "context", "--description", "orphan"]).is_err());
}

#[test]
fn parse_context_dry_run() {
    match parse(&["context", "--dry-run"]) {
        Commands::Context(args) => {
            assert!(args.dry_run);
            assert!(args.capability.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_reconcile_paths() {
    match parse(&[
        "reconcile",
        "--existing",
        "a.json",
        "--incoming",
        "b.json",
        "-o",
        "c.json",
    ]) {
        Commands::Reconcile(args) => {
            assert_eq!(args.existing.to_str(), Some("a.json"));
            assert_eq!(args.incoming.to_str(), Some("b.json"));
            assert_eq!(args.output.as_deref().and_then(|p| p.to_str()), Some("c.json"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(Cli::try_parse_from(["wo", "reconcile", "--existing", "a.json"]).is_err());
}

#[test]
fn parse_configure_set_values() {
    match parse(&[
        "configure",
        "set",
        "--target",
        "box1",
        "--value",
        "ErrorThreshold=40.5",
        "--value",
        "EnableLocalLog=false",
    ]) {
        Commands::Configure(args) => match args.command {
            ConfigureCommand::Set { target, values } => {
                assert_eq!(target.target.as_deref(), Some("box1"));
                assert!(target.solution.is_none());
                let parsed = parse_assignments(&values).unwrap();
                assert_eq!(parsed["ErrorThreshold"], ConfigValue::Float(40.5));
                assert_eq!(parsed["EnableLocalLog"], ConfigValue::Bool(false));
            }
            other => panic!("unexpected subcommand: {other:?}"),
        },
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_target_actions() {
    match parse(&["target", "review", "/templates/t/versions/1.0.3", "--target", "box2"]) {
        Commands::Target(args) => {
            assert_eq!(args.target.as_deref(), Some("box2"));
            match args.command {
                TargetCommand::Review {
                    template_version_id,
                } => assert_eq!(template_version_id, "/templates/t/versions/1.0.3"),
                other => panic!("unexpected subcommand: {other:?}"),
            }
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(Cli::try_parse_from(["wo", "target", "install"]).is_err());
}

#[test]
fn parse_version_subcommands() {
    assert!(matches!(
        parse(&["version", "next"]),
        Commands::Version(args) if matches!(args.command, VersionCommand::Next)
    ));
    assert!(matches!(
        parse(&["version", "show"]),
        Commands::Version(args) if matches!(args.command, VersionCommand::Show)
    ));
}

#[test]
fn global_flags_after_subcommand() {
    let cli = Cli::parse_from(["wo", "auth", "--scope", "api://x/.default", "--format", "json", "-vv"]);
    assert_eq!(cli.output_format(), OutputFormat::Json);
    assert_eq!(cli.verbose, 2);
    match cli.command {
        Commands::Auth(args) => assert_eq!(args.scope.as_deref(), Some("api://x/.default")),
        other => panic!("unexpected command: {other:?}"),
    }
}
