use std::net::IpAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod handlers;
mod logic;
mod state;

use crate::handlers::serve;
use crate::state::AppState;

const DEFAULT_PORT: u16 = 6666;

#[derive(Parser)]
#[command(author, version, about = "Listen for strokes streamed by sketch clients")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    /// Defaults to $PORT, then 6666.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketch_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let port = args
        .port
        .or_else(|| {
            std::env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
        })
        .unwrap_or(DEFAULT_PORT);

    let listener = TcpListener::bind((args.host, port))
        .await
        .expect("Failed to bind listener");
    let local = listener.local_addr().expect("Listener has no local address");
    info!(%local, "sketch server listening");

    serve(listener, AppState::default()).await;
}
