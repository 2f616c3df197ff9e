//! Lemcache Daemon - Redis-compatible RESP server

use anyhow::Result;
use clap::Parser;
use lemcache::MemoryStore;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, env = "LEMD_BIND", default_value = "127.0.0.1:6379")]
    bind: String,

    /// Health check mode: PING a running daemon and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.health {
        match lemd::ping(&args.bind, Duration::from_secs(2)).await {
            Ok(()) => {
                println!("OK");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    info!("Starting lemd v{}", env!("CARGO_PKG_VERSION"));

    let listener = TcpListener::bind(&args.bind).await?;
    info!("Server listening on {}", listener.local_addr()?);

    println!("\nlemd ready (in-memory, no persistence, no expiry)");
    println!("   Connection String: redis://{}", args.bind);
    println!("   Rust:              LemmingCache::new(\"{}\")", args.bind);
    println!("\nPress Ctrl+C to stop\n");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    lemd::serve(listener, MemoryStore::new(), shutdown).await?;
    info!("lemd stopped");
    Ok(())
}
