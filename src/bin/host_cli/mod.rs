//! CLI subcommand implementations for sandbox-host

pub mod check;
pub mod output;
pub mod run;
