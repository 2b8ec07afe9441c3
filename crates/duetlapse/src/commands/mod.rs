//! Subcommand handlers.

pub mod config_cmd;
pub mod inject;
pub mod run;
