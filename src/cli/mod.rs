//! CLI module for changecast
//!
//! Provides command-line interface for:
//! - serve: run the gateway until interrupted
//! - token: print a signed test token

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command, ServeArgs, TokenArgs};
pub use commands::{run, run_command, run_gateway, serve, token};
pub use errors::{CliError, CliErrorCode, CliResult};
