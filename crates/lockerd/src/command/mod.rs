//! CLI subcommands.

mod server;
mod version;

use std::process::ExitCode;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Start the lockerd server
    Server(server::ServerArgs),

    /// Display lockerd version
    Version,
}

pub async fn run(command: Command) -> ExitCode {
    match command {
        Command::Server(args) => server::run(args).await,
        Command::Version => version::run(),
    }
}
