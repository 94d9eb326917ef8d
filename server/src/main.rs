use clap::Parser;
use log::info;
use server::config::EngineConfig;
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// JSON file with roulette settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session seed, for replaying a session exactly
    #[arg(short, long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading roulette settings from {}", path.display());
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let tick_rate = args.tick_rate.max(1);
    let address = format!("{}:{}", args.host, args.port);
    info!("Starting roulette server on {} at {} Hz", address, tick_rate);

    let mut server = Server::new(
        &address,
        Duration::from_millis(1000 / tick_rate as u64),
        args.max_clients,
        config,
    )
    .await?;

    server.run().await?;

    Ok(())
}
