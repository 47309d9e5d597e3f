//! CLI command handling
//!
//! One-off commands open a control link, do their exchange and close it.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::commands::Commands;
use crate::common::{config::Config, logging, paths, Error, Result};
use crate::control::Envelope;
use crate::service::{self, Link};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: Config, socket: Option<PathBuf>) -> Result<()> {
    let socket_path = config.socket_path(socket);

    match command {
        Commands::Run => service::run(config, socket_path).await,

        Commands::Send {
            category,
            action,
            payload,
            session,
            timeout,
        } => {
            let payload = parse_payload(payload.as_deref())?;
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.request_timeout());

            let mut request = Envelope::request(category.as_str(), action.as_str(), payload);
            if let Some(session) = session {
                request = request.with_session(session);
            }

            let link = Link::open(&config, socket_path);
            let result = exchange(&link, request, timeout).await;
            link.close().await;

            let response = result?;
            println!("{}", serde_json::to_string_pretty(&response)?);

            match response.error {
                Some(message) => Err(Error::remote(&category, &action, &message)),
                None => Ok(()),
            }
        }

        Commands::Emit {
            category,
            action,
            payload,
        } => {
            let payload = parse_payload(payload.as_deref())?;
            let event = Envelope::event(category.as_str(), action.as_str(), payload);

            let link = Link::open(&config, socket_path);
            let result = async {
                link.ready(config.request_timeout()).await?;
                let frame = crate::control::envelope::encode(&event)?;
                link.connection.send_confirmed(frame).await
            }
            .await;
            link.close().await;
            result?;

            println!("Sent {}/{} ({})", category, action, event.id);
            Ok(())
        }

        Commands::Paths => {
            println!("Socket: {}", socket_path.display());
            match paths::config_path() {
                Some(path) => println!("Config: {}", path.display()),
                None => println!("Config: (no home directory)"),
            }
            match logging::service_log_path() {
                Some(path) => println!("Log:    {}", path.display()),
                None => println!("Log:    (no home directory)"),
            }
            Ok(())
        }
    }
}

/// Wait for the link, then send the request and await its response
///
/// Both waits share one `timeout`.
async fn exchange(link: &Link, request: Envelope, timeout: Duration) -> Result<Envelope> {
    let deadline = Instant::now() + timeout;
    link.ready(timeout).await?;
    let remaining = deadline.saturating_duration_since(Instant::now());
    link.router.request(request, remaining).await
}

fn parse_payload(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|text| {
        serde_json::from_str(text).map_err(|e| Error::InvalidPayload(format!("--payload: {}", e)))
    })
    .transpose()
}
