//! CLI entry point for the fabric-map binary.

use std::env;
use std::process;

use fabric_core as _;
use fabric_map::{
    check, describe, init_logging, load_config, parse_args, run_channel, CliError, Command,
    ParseResult, USAGE_TEXT,
};
use serde_json as _;
#[cfg(test)]
use tempfile as _;
use toml as _;
use tracing as _;
use tracing_subscriber as _;

fn run(command: &Command) -> Result<(), CliError> {
    match command {
        Command::Describe(source) => println!("{}", describe(&load_config(source)?)?),
        Command::Check(source) => println!("{}", check(&load_config(source)?)?),
        Command::Run(args) => println!("{}", run_channel(&load_config(&args.source)?, args)?),
    }
    Ok(())
}

fn main() {
    init_logging();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => match run(&command) {
            Ok(()) => 0,
            Err(error) => {
                eprintln!("error: {error}");
                1
            }
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            2
        }
    };

    process::exit(exit_code);
}
