use clap::Parser;
use sketch_client::shell::{parse_dimension, run_shell};
use sketch_client::SessionController;
use sketch_shared::CanvasSize;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about = "Draw strokes from stdin and stream them to a sketch listener")]
struct Args {
    /// Listener to connect to on start, as host:port.
    #[arg(long)]
    server: Option<String>,
    #[arg(long, default_value_t = 1024.0, value_parser = parse_dimension)]
    width: f64,
    #[arg(long, default_value_t = 768.0, value_parser = parse_dimension)]
    height: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut session = SessionController::new(CanvasSize {
        width: args.width,
        height: args.height,
    });

    if let Some(server) = args.server.as_deref() {
        match session.connect(server).await {
            Ok(()) => info!(%server, "connected"),
            Err(error) => error!(%server, %error, "initial connect failed"),
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    if let Err(error) = run_shell(&mut session, stdin, tokio::io::stdout()).await {
        error!(%error, "shell stopped");
    }
}
