// Reporting sinks: where per-cycle output goes

use crate::engine::types::{CycleReport, EngineConfig, LatencyBand};

/// Receives one report per successful cycle. Failed cycles produce no
/// call at all; a stalled feed is visible only as silence.
pub trait ReportSink: Send + Sync {
    fn on_cycle(&self, report: &CycleReport);

    /// Advisory notices (e.g. rate-cap warnings). Not an error channel.
    fn on_advisory(&self, _message: &str) {}
}

/// Renders cycles to stdout the way the simulator always has: a stats
/// block, a simulated order-book ladder, and a performance footer.
/// With `json` set it emits one serialized report per line instead.
pub struct ConsoleSink {
    pub json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Startup banner with the configuration echo.
    pub fn print_banner(&self, config: &EngineConfig) {
        if self.json {
            return;
        }
        println!("\n╔════════════════════════════════════════╗");
        println!("║   MARKET MAKER SIMULATOR - US STOCKS   ║");
        println!("╚════════════════════════════════════════╝");
        println!("\nConfiguration:");
        println!("  Symbol:     {}", config.symbol);
        println!("  Spread:     {} bps", config.spread_bps);
        println!("  Order Size: {} shares", config.order_size);
        println!(
            "  API Key:    {}",
            if config.limited_mode() { "DEMO (limited)" } else { "Custom" }
        );
        if config.limited_mode() {
            println!("\n⚠️  Using DEMO key (limited to 25 requests/day)");
            println!("   Get a FREE key at: https://www.alphavantage.co/support/#api-key");
        }
        println!();
    }

    fn print_stats(&self, r: &CycleReport) {
        println!("\n========================================");
        println!("[Cycle #{}]", r.cycle);
        println!("========================================");
        println!("Symbol:      {}", r.symbol);
        println!("Mid Price:   ${:.2}", r.mid);
        println!("Our Bid:     ${:.2} ({} shares)", r.bid, r.order_size);
        println!("Our Ask:     ${:.2} ({} shares)", r.ask, r.order_size);
        println!("Spread:      ${:.4} ({} bps)", r.spread_dollars, r.spread_bps);
        println!("Profit/RT:   ${:.2} per round trip", r.profit_per_round_trip);
        println!("Latency:     {} μs", r.latency_micros);
        println!("========================================");
    }

    // Daily low/high stand in for the market's side of the ladder.
    fn print_ladder(&self, r: &CycleReport) {
        println!("\n=== SIMULATED ORDER BOOK ===");
        match r.market_high {
            Some(high) => println!("Market ASK:  ${:.2} (daily high)", high),
            None => println!("Market ASK:  n/a"),
        }
        println!("Our ASK:     ${:.2} [{} shares]  <-- SELL", r.ask, r.order_size);
        println!("------------ MID: ${:.2} ------------", r.mid);
        println!("Our BID:     ${:.2} [{} shares]  <-- BUY", r.bid, r.order_size);
        match r.market_low {
            Some(low) => println!("Market BID:  ${:.2} (daily low)", low),
            None => println!("Market BID:  n/a"),
        }
    }

    fn print_performance(&self, r: &CycleReport) {
        println!("\n📊 Performance:");
        println!("   Cycle time:  {:.1} ms", r.latency_micros as f64 / 1000.0);
        let status = match r.latency_band {
            LatencyBand::Fast => "✅ FAST",
            LatencyBand::Moderate => "⚠️  MODERATE",
            LatencyBand::Slow => "❌ SLOW",
        };
        println!("   Status:      {}", status);
        println!("\nWaiting {} seconds (API rate limit)...", r.next_wait_secs);
    }
}

impl ReportSink for ConsoleSink {
    fn on_cycle(&self, report: &CycleReport) {
        if self.json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!(error = %e, "failed to serialize cycle report"),
            }
            return;
        }
        self.print_stats(report);
        self.print_ladder(report);
        self.print_performance(report);
    }

    fn on_advisory(&self, message: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "advisory": message }));
        } else {
            println!("\n⚠️  {}", message);
        }
    }
}
