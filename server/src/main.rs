use clap::Parser;
use log::{error, info};
use server::config::{self, Config};
use server::network::Server;
use std::path::PathBuf;

/// Main-method of the application.
/// Parses command-line arguments, loads the config and skin list, then runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Tick length in milliseconds, overrides the config file
        #[clap(short, long)]
        tick_ms: Option<u64>,
        /// Maximum concurrent connections, overrides the config file
        #[clap(short, long)]
        max_clients: Option<usize>,
        /// JSON config file
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Newline-separated list of skins for `<r>` nicknames
        #[clap(short, long, default_value = "randomskins.txt")]
        skins: PathBuf,
    }

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
    }
    if let Some(max_clients) = args.max_clients {
        config.max_connections = max_clients;
    }
    let skins = config::load_random_skins(&args.skins);
    info!(
        "Starting {} (mode {}, {} ms ticks, {} random skins)",
        config.server_name,
        config.server_gamemode,
        config.tick_ms,
        skins.len()
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config, skins).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
