use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::error::ServerError;
use server::network::Server;
use server::rooms::{RoomDefaults, RoomRegistry};
use shared::KillerType;
use std::path::PathBuf;
use std::time::Duration;

/// Authoritative match server for House of Last Light
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "20")]
    tick_rate: u32,
    /// Maximum number of connected clients
    #[clap(short, long, default_value = "32")]
    max_clients: usize,
    /// JSON tuning file; built-in defaults when omitted
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Fixed house seed for every room
    #[clap(long)]
    seed: Option<u64>,
    /// Fixed killer type for every room (stalker, phantom, brute)
    #[clap(long)]
    killer_type: Option<KillerType>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            GameConfig::from_file(path)?
        }
        None => GameConfig::default(),
    };

    let rooms = RoomRegistry::new(
        config,
        RoomDefaults {
            seed: args.seed,
            killer_type: args.killer_type,
        },
    );

    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1)));
    let server = Server::new(&address, tick_duration, args.max_clients, rooms).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
