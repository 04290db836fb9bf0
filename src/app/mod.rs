//! Binary-side wiring: CLI, startup and subcommand handlers

pub mod cli;
pub mod commands;
pub mod init;
