//! The `version` subcommand.

use std::process::ExitCode;

use crate::version;

pub fn run() -> ExitCode {
    println!("lockerd {}", version::human_version());
    ExitCode::SUCCESS
}
