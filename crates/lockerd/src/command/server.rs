//! The `server` subcommand.

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Args;
use tracing::{error, info};

use lockerd_core::{LockManager, ManagerConfig};

use crate::version;

#[derive(Args)]
pub struct ServerArgs {
    /// Listening address
    #[arg(long, default_value = ":12000", value_name = "ADDR")]
    pub address: String,
}

pub async fn run(args: ServerArgs) -> ExitCode {
    let addr = match parse_listen_addr(&args.address) {
        Ok(addr) => addr,
        Err(err) => {
            error!(address = %args.address, %err, "invalid listening address");
            return ExitCode::from(2);
        }
    };

    let manager = LockManager::new(ManagerConfig::default());
    manager.start();

    info!(
        version = %version::human_version(),
        %addr,
        "starting lockerd HTTP API server"
    );

    let result = lockerd_http::serve(addr, manager.clone()).await;
    manager.stop();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "error running HTTP server");
            ExitCode::FAILURE
        }
    }
}

/// Parses a listening address, allowing the bare `:PORT` form to mean
/// "all interfaces".
fn parse_listen_addr(raw: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    if let Some(port) = raw.strip_prefix(':') {
        return format!("0.0.0.0:{port}").parse();
    }

    raw.parse()
}
