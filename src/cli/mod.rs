//! CLI module for file-taxes - command-line interface and subcommands.
//!
//! With no subcommand the full filing run is performed.

pub mod commands;

pub use commands::Cli;
