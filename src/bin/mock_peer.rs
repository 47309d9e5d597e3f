//! Mock supervisor peer for manual and integration testing
//!
//! Listens on the given socket path, announces `system/ready` to every
//! client, answers keep-alive pings with pongs and echoes request payloads
//! back as `{"echo": <payload>}`.
//!
//! Usage: `mock_peer <socket-path>`

use std::path::PathBuf;

use companion_link::control::envelope::{self, actions, Category, Envelope};
use companion_link::ipc::{keepalive, transport};
use interprocess::local_socket::traits::tokio::Listener as ListenerTrait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: mock_peer <socket-path>");
        std::process::exit(2);
    };

    if let Err(e) = serve(path).await {
        eprintln!("mock_peer: {e}");
        std::process::exit(1);
    }
}

async fn serve(path: PathBuf) -> std::io::Result<()> {
    let listener = transport::create_listener(&path).await?;
    tracing::info!(socket = %path.display(), "Mock peer listening");
    // Readiness marker for test harnesses
    println!("listening");

    loop {
        let stream = listener.accept().await?;
        tracing::info!("Client connected");
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream).await {
                tracing::warn!(error = %e, "Client session ended with error");
            }
            tracing::info!("Client disconnected");
        });
    }
}

async fn handle_client(stream: transport::platform::Stream) -> std::io::Result<()> {
    let (read, mut write) = tokio::io::split(stream);

    let ready = Envelope::event(Category::System, actions::READY, None);
    write_frame(&mut write, &envelope::encode(&ready).map_err(to_io)?).await?;

    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let frame = line.as_bytes();
        if frame.is_empty() {
            continue;
        }

        if keepalive::is_ping(frame) {
            let pong = json!({ "type": "pong", "timestamp": unix_seconds() });
            write_frame(&mut write, &serde_json::to_vec(&pong)?).await?;
            continue;
        }

        let message = match envelope::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed frame");
                continue;
            }
        };
        tracing::info!(
            kind = %message.kind,
            category = %message.category,
            action = %message.action,
            "Received"
        );

        if message.is_request() {
            let echo = json!({ "echo": message.payload.clone() });
            let reply = Envelope::response(&message, Some(echo));
            write_frame(&mut write, &envelope::encode(&reply).map_err(to_io)?).await?;
        }
    }
    Ok(())
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn unix_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn to_io(e: companion_link::Error) -> std::io::Error {
    std::io::Error::other(e.to_string())
}
