//! Unit suite: configuration documents and command-line parsing.

mod cli_command_parse_tests;
mod config_tests;
