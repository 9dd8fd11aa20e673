//! Tests for status, remove, and completions.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_status() {
    match parse(&["offex", "status"]) {
        CliCommand::Status => {}
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["offex", "remove", "1700000000000"]) {
        CliCommand::Remove { key } => assert_eq!(key, 1_700_000_000_000),
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["offex", "completions", "bash"]) {
        CliCommand::Completions { shell } => {
            assert_eq!(shell, clap_complete::Shell::Bash);
        }
        _ => panic!("expected Completions"),
    }
}
