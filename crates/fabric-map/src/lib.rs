//! Loads, validates and publishes interconnect fabric descriptions.

/// Command-line argument parsing.
pub mod args;
/// Command implementations.
pub mod commands;
/// Error reporting for the command surface.
pub mod errors;

pub use args::{parse_args, Command, ConfigSource, ParseResult, RunArgs, USAGE_TEXT};
pub use commands::{check, describe, init_logging, load_config, run_channel, ChannelReport};
pub use errors::CliError;

#[cfg(test)]
use tempfile as _;
