//! CLI command definitions
//!
//! Defines the clap commands for the companion-link CLI.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control link service until interrupted
    Run,

    /// Send one request and print the response
    Send {
        /// Category to route to (system, terminal, screencap, git, notification, ...)
        category: String,

        /// Action within the category
        action: String,

        /// Request payload as JSON
        #[arg(long, short)]
        payload: Option<String>,

        /// Session the request belongs to
        #[arg(long)]
        session: Option<String>,

        /// Seconds to wait for the response (default: from config)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Send one event (no response expected)
    Emit {
        /// Category of the event
        category: String,

        /// Event action
        action: String,

        /// Event payload as JSON
        #[arg(long, short)]
        payload: Option<String>,
    },

    /// Show socket, config and log locations
    Paths,
}
