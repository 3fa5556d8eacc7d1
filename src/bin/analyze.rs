//! Command-line mirror of the analysis endpoints
//!
//! Prints one JSON line to stdout per invocation; diagnostics go to stderr.
//!
//! Examples:
//!   analyze rsi AAPL
//!   analyze speedtraffic 005930.KS
//!   echo '{"tickers":["AAPL"],"weights":[1.0],...}' | analyze backtest

use std::io::Read;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use speedtraffic::analysis::{self, AnalysisContext};
use speedtraffic::backtest::{self, BacktestRequest};
use speedtraffic::error::Result;
use speedtraffic::lstm;

#[derive(Parser)]
#[command(name = "analyze", about = "Traffic-light stock analyses from the command line")]
struct Cli {
    /// Directory holding the industry map and CSV snapshots
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Cache directory; defaults to <data-dir>/cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 14-day RSI
    Rsi { symbol: String },
    /// 14-day Money Flow Index
    Mfi { symbol: String },
    /// 20-day, 2-sigma Bollinger %B
    Bollinger { symbol: String },
    /// Market beta against the benchmark index
    Capm { symbol: String },
    /// GARCH(1,1) one-day risk forecast
    Garch { symbol: String },
    /// Beta against the industry peer portfolio
    Industry { symbol: String },
    /// LSTM next-day direction forecast
    Lstm {
        symbol: String,
        /// Anchor date for the temporal split; defaults to the last session
        #[arg(long)]
        reference_date: Option<NaiveDate>,
    },
    /// All analyses plus the composite traffic lights
    Speedtraffic { symbol: String },
    /// Portfolio backtest; reads the JSON request from stdin
    Backtest,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

async fn dispatch(ctx: &AnalysisContext, command: Command) -> Result<()> {
    match command {
        Command::Rsi { symbol } => {
            print_json(&analysis::rsi::run(ctx, &symbol.to_uppercase()).await?)
        }
        Command::Mfi { symbol } => {
            print_json(&analysis::mfi::run(ctx, &symbol.to_uppercase()).await?)
        }
        Command::Bollinger { symbol } => {
            print_json(&analysis::bollinger::run(ctx, &symbol.to_uppercase()).await?)
        }
        Command::Capm { symbol } => {
            print_json(&analysis::capm::run(ctx, &symbol.to_uppercase()).await?)
        }
        Command::Garch { symbol } => {
            print_json(&analysis::garch::run(ctx, &symbol.to_uppercase()).await?)
        }
        Command::Industry { symbol } => {
            print_json(&analysis::industry::run(ctx, &symbol.to_uppercase()).await?)
        }
        Command::Lstm {
            symbol,
            reference_date,
        } => {
            let config = lstm::TrainConfig::default();
            print_json(
                &lstm::run(ctx, &symbol.to_uppercase(), reference_date, &config).await?,
            )
        }
        Command::Speedtraffic { symbol } => {
            print_json(&analysis::unified::run(ctx, &symbol.to_uppercase()).await?)
        }
        Command::Backtest => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            let request: BacktestRequest = serde_json::from_str(&raw)?;
            let data = backtest::run(ctx, &request).await?;
            print_json(&serde_json::json!({ "success": true, "data": data }))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cache_dir = cli.cache_dir.unwrap_or_else(|| cli.data_dir.join("cache"));
    let ctx = AnalysisContext::with_default_chain(cli.data_dir, cache_dir);

    if let Err(err) = dispatch(&ctx, cli.command).await {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
