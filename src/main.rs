use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use mmq_rs::engine::{EngineConfig, QuotingEngine};
use mmq_rs::feed::AlphaVantageFeed;
use mmq_rs::report::ConsoleSink;
use mmq_rs::telemetry;

/// Display-only market maker simulation around a live quote feed.
#[derive(Parser, Debug)]
#[command(name = "mmq", version)]
struct Args {
    /// Instrument to quote
    #[arg(default_value = "AAPL", env = "MMQ_SYMBOL")]
    symbol: String,

    /// Alpha Vantage API key ("demo" runs in rate-capped mode)
    #[arg(default_value = "demo", env = "MMQ_API_KEY")]
    api_key: String,

    /// Quoted spread in basis points
    #[arg(long, default_value_t = 5.0, env = "MMQ_SPREAD_BPS")]
    spread_bps: f64,

    /// Shares per simulated order
    #[arg(long, default_value_t = 100, env = "MMQ_ORDER_SIZE")]
    order_size: u32,

    /// Seconds between successful cycles (demo keys wait longer)
    #[arg(long, env = "MMQ_POLL_SECS")]
    poll_secs: Option<u64>,

    /// Seconds to wait after a failed cycle
    #[arg(long, default_value_t = 5, env = "MMQ_RETRY_SECS")]
    retry_secs: u64,

    /// Emit one JSON report per line instead of the console display
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.symbol, &self.api_key);
        config.spread_bps = self.spread_bps;
        config.order_size = self.order_size;
        if let Some(secs) = self.poll_secs {
            config.poll_interval = Duration::from_secs(secs);
            config.limited_poll_interval = Duration::from_secs(secs);
        }
        config.retry_interval = Duration::from_secs(self.retry_secs);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    let args = Args::parse();
    let json = args.json;

    telemetry::init_tracing("mmq_rs=info");
    telemetry::init_metrics();

    let config = args.into_config();
    let sink = Arc::new(ConsoleSink::new(json));
    sink.print_banner(&config);

    let feed = Arc::new(AlphaVantageFeed::new(&config.symbol, &config.api_key));
    let engine = QuotingEngine::new(config, feed, sink);
    let handle = engine.handle();

    let runner = tokio::spawn(engine.run());

    if !json {
        println!("Press Enter (or Ctrl+C) to stop...\n");
    }
    let mut line = String::new();
    let mut stdin_reader = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = stdin_reader.read_line(&mut line) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    info!("stop requested, waiting for the current cycle to finish");
    handle.request_stop();
    runner.await?;

    if !json {
        println!("\n✅ Market maker stopped.");
    }
    Ok(())
}
