//! CLI module for stacktop - command-line parsing into a `RunConfig`.

pub mod commands;

pub use commands::Cli;
