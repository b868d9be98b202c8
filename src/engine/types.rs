use std::time::Duration;

/// Strategy + cadence parameters, frozen once the engine is built.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    pub api_key: String,
    /// Half of this sits on each side of mid.
    pub spread_bps: f64,
    /// Shares per simulated order, display only.
    pub order_size: u32,
    /// Steady-state wait between successful cycles.
    pub poll_interval: Duration,
    /// Steady-state wait when running on a rate-capped key.
    pub limited_poll_interval: Duration,
    /// Wait after a failed cycle; shorter than either poll interval.
    pub retry_interval: Duration,
    /// Successful-cycle count after which limited mode warns once.
    pub limited_warn_threshold: u64,
}

/// Sentinel key that puts the engine in rate-capped (limited) mode.
pub const DEMO_API_KEY: &str = "demo";

impl EngineConfig {
    pub fn new(symbol: &str, api_key: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            api_key: api_key.to_string(),
            spread_bps: 5.0,
            order_size: 100,
            // Alpha Vantage free tier: 5 calls/minute, so 12+ seconds
            poll_interval: Duration::from_secs(12),
            limited_poll_interval: Duration::from_secs(15),
            retry_interval: Duration::from_secs(5),
            limited_warn_threshold: 6,
        }
    }

    pub fn limited_mode(&self) -> bool {
        self.api_key == DEMO_API_KEY
    }

    pub fn steady_wait(&self) -> Duration {
        if self.limited_mode() {
            self.limited_poll_interval
        } else {
            self.poll_interval
        }
    }
}

/// Synthetic two-sided quote around the latest mid. Recomputed every
/// cycle from the held quote, never stored.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DerivedMarket {
    pub mid: f64,
    pub bid: f64,
    pub ask: f64,
    pub spread_bps: f64,
}

impl DerivedMarket {
    pub fn from_mid(mid: f64, spread_bps: f64) -> Self {
        let spread_fraction = spread_bps / 10_000.0;
        Self {
            mid,
            bid: mid * (1.0 - spread_fraction),
            ask: mid * (1.0 + spread_fraction),
            spread_bps,
        }
    }

    pub fn spread_dollars(&self) -> f64 {
        self.ask - self.bid
    }

    /// Simulated earnings from one buy-at-bid, sell-at-ask pair.
    pub fn profit_per_round_trip(&self, order_size: u32) -> f64 {
        self.spread_dollars() * order_size as f64
    }
}

/// Status colour for the measured cycle latency. Display only, no
/// effect on control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum LatencyBand {
    Fast,
    Moderate,
    Slow,
}

const FAST_LATENCY: Duration = Duration::from_millis(100);
const MODERATE_LATENCY: Duration = Duration::from_millis(500);

impl LatencyBand {
    pub fn classify(latency: Duration) -> Self {
        if latency < FAST_LATENCY {
            LatencyBand::Fast
        } else if latency < MODERATE_LATENCY {
            LatencyBand::Moderate
        } else {
            LatencyBand::Slow
        }
    }
}

/// Everything a sink needs to render one successful cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub symbol: String,
    pub mid: f64,
    pub bid: f64,
    pub ask: f64,
    pub spread_bps: f64,
    pub spread_dollars: f64,
    pub profit_per_round_trip: f64,
    pub order_size: u32,
    pub latency_micros: u64,
    pub latency_band: LatencyBand,
    pub next_wait_secs: u64,
    /// Provider's daily low/high, shown as "market bid/ask" on the
    /// simulated ladder. Display simulation, not book data.
    pub market_low: Option<f64>,
    pub market_high: Option<f64>,
}

/// Run-loop lifecycle. Single-shot: `Stopped` is terminal, a fresh
/// engine is needed to run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl EngineState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => EngineState::Idle,
            1 => EngineState::Running,
            2 => EngineState::Stopping,
            _ => EngineState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derived_market_known_values() {
        // 123.45 mid at 5 bps
        let market = DerivedMarket::from_mid(123.45, 5.0);
        assert!((market.bid - 123.388275).abs() < 1e-9);
        assert!((market.ask - 123.511725).abs() < 1e-9);
        assert!((market.spread_dollars() - 0.12345).abs() < 1e-9);
        assert!((market.profit_per_round_trip(100) - 12.345).abs() < 1e-6);
    }

    #[test]
    fn test_latency_bands() {
        assert_eq!(LatencyBand::classify(Duration::from_millis(3)), LatencyBand::Fast);
        assert_eq!(LatencyBand::classify(Duration::from_millis(99)), LatencyBand::Fast);
        assert_eq!(LatencyBand::classify(Duration::from_millis(100)), LatencyBand::Moderate);
        assert_eq!(LatencyBand::classify(Duration::from_millis(499)), LatencyBand::Moderate);
        assert_eq!(LatencyBand::classify(Duration::from_secs(2)), LatencyBand::Slow);
    }

    #[test]
    fn test_config_defaults_and_modes() {
        let cfg = EngineConfig::new("AAPL", DEMO_API_KEY);
        assert!(cfg.limited_mode());
        assert_eq!(cfg.steady_wait(), Duration::from_secs(15));
        assert_eq!(cfg.spread_bps, 5.0);
        assert_eq!(cfg.order_size, 100);
        assert!(cfg.retry_interval < cfg.poll_interval);

        let cfg = EngineConfig::new("AAPL", "REALKEY123");
        assert!(!cfg.limited_mode());
        assert_eq!(cfg.steady_wait(), Duration::from_secs(12));
    }

    proptest! {
        // bid < mid < ask, and the dollar spread matches the bps maths.
        #[test]
        fn prop_spread_invariant(mid in 0.01f64..100_000.0, bps in 0.01f64..500.0) {
            let m = DerivedMarket::from_mid(mid, bps);
            prop_assert!(m.bid < m.mid);
            prop_assert!(m.mid < m.ask);
            let expected = mid * 2.0 * bps / 10_000.0;
            prop_assert!((m.spread_dollars() - expected).abs() <= expected * 1e-9 + 1e-12);
        }
    }
}
