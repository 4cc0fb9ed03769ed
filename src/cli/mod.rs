//! CLI module for turnkeeper - command-line interface and subcommands.
//!
//! Provides the operator surface: status, mode overrides, reset, and the
//! poll loop.

pub mod commands;

pub use commands::Cli;
