//! Tests for add and run subcommands.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_add() {
    match parse(&["offex", "add", "someone@example.org", "taxon:falco"]) {
        CliCommand::Add {
            email,
            query,
            file_name,
            kind,
            records,
        } => {
            assert_eq!(email, "someone@example.org");
            assert_eq!(query, "taxon:falco");
            assert_eq!(file_name, "export");
            assert_eq!(kind, "index");
            assert!(records.is_none());
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_with_flags() {
    match parse(&[
        "offex",
        "add",
        "someone@example.org",
        "year:2024",
        "--file-name",
        "annual report",
        "--kind",
        "archive",
        "--records",
        "500",
    ]) {
        CliCommand::Add {
            email,
            query,
            file_name,
            kind,
            records,
        } => {
            assert_eq!(email, "someone@example.org");
            assert_eq!(query, "year:2024");
            assert_eq!(file_name, "annual report");
            assert_eq!(kind, "archive");
            assert_eq!(records, Some(500));
        }
        _ => panic!("expected Add with flags"),
    }
}

#[test]
fn cli_parse_add_requires_query() {
    use clap::Parser;
    assert!(crate::cli::Cli::try_parse_from(["offex", "add", "someone@example.org"]).is_err());
}

#[test]
fn cli_parse_run() {
    match parse(&["offex", "run"]) {
        CliCommand::Run => {}
        _ => panic!("expected Run"),
    }
}
