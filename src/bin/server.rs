//! SpeedTraffic analysis server
//!
//! Run: cargo run --release --bin server
//! Test: curl 'http://localhost:3030/api/rsi?symbol=AAPL'

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use speedtraffic::analysis::AnalysisContext;
use speedtraffic::server;

#[derive(Parser)]
#[command(name = "server", about = "Traffic-light stock analysis over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 3030)]
    port: u16,

    /// Directory holding the industry map and CSV snapshots
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Cache directory; defaults to <data-dir>/cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let cache_dir = args
        .cache_dir
        .unwrap_or_else(|| args.data_dir.join("cache"));
    let ctx = Arc::new(AnalysisContext::with_default_chain(args.data_dir, cache_dir));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    if let Err(err) = server::serve(ctx, addr).await {
        eprintln!("server error: {}", err);
        std::process::exit(1);
    }
}
