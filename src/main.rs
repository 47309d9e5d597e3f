//! companion-link - control-plane link to the local supervisor process
//!
//! Runs the long-lived control link service, or sends one-off requests and
//! events over the supervisor's Unix domain socket.

use std::path::PathBuf;

use clap::Parser;
use companion_link::common::{config::Config, logging};
use companion_link::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "companion-link", about = "Control-plane link to the companion supervisor")]
#[command(version, long_about = None)]
struct Cli {
    /// Control socket path (overrides config and default location)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_guard = match cli.command {
        Commands::Run => Some(logging::init_service()),
        _ => {
            logging::init_cli();
            None
        }
    };

    let result = match Config::load() {
        Ok(config) => cli::dispatch(cli.command, config, cli.socket).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        drop(log_guard);
        std::process::exit(1);
    }
}
