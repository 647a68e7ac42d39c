mod ledger;
mod network;
mod session;

use clap::Parser;
use log::info;
use network::ScoreServer;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Committed total a participant needs to win the match
    #[arg(short = 'w', long, default_value = "30")]
    points_to_win: i64,

    /// Consecutive losing rounds before a comeback boost unlocks
    #[arg(short = 'l', long, default_value = "3")]
    losing_rounds: u32,

    /// Maximum number of connected participants
    #[arg(short = 'm', long, default_value = "4")]
    max_participants: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting score server on {}", address);

    let mut server = ScoreServer::new(
        &address,
        args.points_to_win,
        args.losing_rounds,
        args.max_participants,
    )
    .await?;

    server.run().await?;

    Ok(())
}
