//! Tests for the providers subcommand and global flags.

use std::path::Path;

use clap::Parser;

use super::{parse, CliCommand};

#[test]
fn cli_parse_providers() {
    let cli = parse(&["publogs", "providers"]);
    assert!(matches!(cli.command, CliCommand::Providers));
    assert!(cli.config.is_none());
}

#[test]
fn cli_parse_global_config_after_subcommand() {
    let cli = parse(&["publogs", "providers", "--config", "/etc/publogs.toml"]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/publogs.toml")));

    let cli = parse(&["publogs", "--config", "alt.toml", "run"]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("alt.toml")));
    assert!(matches!(cli.command, CliCommand::Run(_)));
}

#[test]
fn cli_requires_a_subcommand() {
    assert!(crate::cli::Cli::try_parse_from(["publogs"]).is_err());
}
