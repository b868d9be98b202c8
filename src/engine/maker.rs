// The quoting loop: poll -> extract -> derive -> report -> sleep

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::engine::types::{CycleReport, DerivedMarket, EngineConfig, EngineState, LatencyBand};
use crate::feed::{FeedError, QuoteFeed};
use crate::quote::{ExtractError, Quote, QuoteExtractor};
use crate::report::ReportSink;

/// Anything that fails one cycle. Never escalates past the cycle; the
/// loop sleeps the retry interval and tries again.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Shared between the controller and the run loop. The cancellation
/// flag has a single writer (the controller) and a single reader (the
/// loop); the loop checks it at its iteration boundaries.
#[derive(Debug)]
pub struct EngineHandle {
    cancelled: AtomicBool,
    state: AtomicU8,
}

impl EngineHandle {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            state: AtomicU8::new(EngineState::Idle as u8),
        }
    }

    /// Ask the loop to stop at its next check point. Safe from any
    /// task, at any time (before start, after stop), idempotent.
    pub fn request_stop(&self) {
        self.cancelled.store(true, Ordering::Release);
        // Idle/Running move to Stopping; Stopped is terminal.
        for from in [EngineState::Running, EngineState::Idle] {
            if self
                .state
                .compare_exchange(
                    from as u8,
                    EngineState::Stopping as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Idle -> Running. False if stop was requested before start.
    fn begin(&self) -> bool {
        self.state
            .compare_exchange(
                EngineState::Idle as u8,
                EngineState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn finish(&self) {
        self.state.store(EngineState::Stopped as u8, Ordering::Release);
    }
}

/// Loop-owned mutable state. The cancellation flag lives on the
/// handle; the latest quote is published through a shared slot so
/// display readers can see it without touching the loop.
#[derive(Debug, Default)]
struct RunState {
    /// Increments only on successful fetches, starts at 0.
    cycle: u64,
    limited_warned: bool,
}

/// Single-shot quoting engine. `run` consumes it; build a fresh one to
/// run again.
pub struct QuotingEngine {
    config: EngineConfig,
    extractor: QuoteExtractor,
    feed: Arc<dyn QuoteFeed>,
    sink: Arc<dyn ReportSink>,
    handle: Arc<EngineHandle>,
    latest: Arc<Mutex<Option<Quote>>>,
}

impl QuotingEngine {
    pub fn new(config: EngineConfig, feed: Arc<dyn QuoteFeed>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            config,
            extractor: QuoteExtractor::default(),
            feed,
            sink,
            handle: Arc::new(EngineHandle::new()),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Controller-side handle for stop/state.
    pub fn handle(&self) -> Arc<EngineHandle> {
        Arc::clone(&self.handle)
    }

    /// Read-only view of the most recent quote. Written only by the
    /// run loop.
    pub fn latest_quote(&self) -> Arc<Mutex<Option<Quote>>> {
        Arc::clone(&self.latest)
    }

    async fn poll_once(&self) -> Result<Quote, CycleError> {
        let payload = self.feed.fetch().await?;
        let quote = self.extractor.extract(&payload)?;
        Ok(quote)
    }

    /// Drive the poll/derive/report cycle until stop is requested.
    /// Fetch and parse failures never terminate the loop; they only
    /// shorten the wait to the retry interval.
    pub async fn run(self) {
        if !self.handle.begin() {
            // Stop was requested before the loop ever started.
            self.handle.finish();
            info!("engine stopped before first cycle");
            return;
        }
        info!(symbol = %self.config.symbol, limited = self.config.limited_mode(), "engine running");
        metrics::gauge!("mmq_up").set(1.0);

        let mut state = RunState::default();
        loop {
            if self.handle.is_cancelled() {
                break;
            }
            let started = Instant::now();

            match self.poll_once().await {
                Ok(quote) => {
                    self.on_success(&mut state, quote, started);
                    if self.handle.is_cancelled() {
                        break;
                    }
                    sleep(self.config.steady_wait()).await;
                }
                Err(e) => {
                    warn!(error = %e, cycle = state.cycle, "cycle failed, waiting for market data");
                    metrics::counter!("mmq_fetch_failures_total").increment(1);
                    if self.handle.is_cancelled() {
                        break;
                    }
                    sleep(self.config.retry_interval).await;
                }
            }
        }

        metrics::gauge!("mmq_up").set(0.0);
        self.handle.finish();
        info!(cycles = state.cycle, "engine stopped");
    }

    fn on_success(&self, state: &mut RunState, quote: Quote, started: Instant) {
        // Supersede the held quote wholesale, then count the cycle.
        let market = DerivedMarket::from_mid(quote.last_price, self.config.spread_bps);
        let (market_low, market_high) = (quote.low, quote.high);
        if let Ok(mut slot) = self.latest.lock() {
            *slot = Some(quote);
        }
        state.cycle += 1;

        let latency = started.elapsed();
        let report = CycleReport {
            cycle: state.cycle,
            symbol: self.config.symbol.clone(),
            mid: market.mid,
            bid: market.bid,
            ask: market.ask,
            spread_bps: market.spread_bps,
            spread_dollars: market.spread_dollars(),
            profit_per_round_trip: market.profit_per_round_trip(self.config.order_size),
            order_size: self.config.order_size,
            latency_micros: latency.as_micros() as u64,
            latency_band: LatencyBand::classify(latency),
            next_wait_secs: self.config.steady_wait().as_secs(),
            market_low,
            market_high,
        };
        info!(
            cycle = report.cycle,
            mid = report.mid,
            bid = report.bid,
            ask = report.ask,
            latency_micros = report.latency_micros,
            "cycle complete"
        );
        metrics::counter!("mmq_cycles_total").increment(1);
        metrics::gauge!("mmq_mid_price").set(market.mid);
        self.sink.on_cycle(&report);

        // Advisory only: a capped key will run out of requests soon
        // after this many cycles, failures or not.
        if self.config.limited_mode()
            && !state.limited_warned
            && state.cycle >= self.config.limited_warn_threshold
        {
            state.limited_warned = true;
            self.sink.on_advisory(
                "DEMO key request budget is nearly spent. Get a free key at alphavantage.co",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedFeed {
        // Pop one response per fetch; transport failure once exhausted.
        responses: Mutex<VecDeque<Result<String, ()>>>,
    }

    impl ScriptedFeed {
        fn new(responses: Vec<Result<String, ()>>) -> Arc<Self> {
            Arc::new(Self { responses: Mutex::new(responses.into_iter().collect()) })
        }
    }

    #[async_trait::async_trait]
    impl QuoteFeed for ScriptedFeed {
        async fn fetch(&self) -> Result<String, FeedError> {
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(Ok(body)) => Ok(body),
                Some(Err(())) | None => Err(FeedError::EmptyResponse),
            }
        }
    }

    #[derive(Default)]
    struct CaptureSink {
        reports: Mutex<Vec<CycleReport>>,
        advisories: Mutex<Vec<String>>,
    }

    impl ReportSink for CaptureSink {
        fn on_cycle(&self, report: &CycleReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
        fn on_advisory(&self, message: &str) {
            self.advisories.lock().unwrap().push(message.to_string());
        }
    }

    fn fast_config(api_key: &str) -> EngineConfig {
        let mut cfg = EngineConfig::new("AAPL", api_key);
        cfg.poll_interval = Duration::from_millis(2);
        cfg.limited_poll_interval = Duration::from_millis(2);
        cfg.retry_interval = Duration::from_millis(1);
        cfg
    }

    fn price_payload(price: f64) -> String {
        format!(r#"{{"Global Quote":{{"05. price":"{:.2}","04. low":"122.00","03. high":"125.00"}}}}"#, price)
    }

    async fn run_until<F: Fn(&CaptureSink) -> bool>(
        engine: QuotingEngine,
        sink: Arc<CaptureSink>,
        done: F,
    ) {
        let handle = engine.handle();
        let task = tokio::spawn(engine.run());
        for _ in 0..500 {
            if done(&sink) {
                break;
            }
            sleep(Duration::from_millis(2)).await;
        }
        handle.request_stop();
        task.await.unwrap();
        assert_eq!(handle.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_cycle_numbers_skip_failed_fetches() {
        let feed = ScriptedFeed::new(vec![
            Ok(price_payload(123.45)),
            Ok(r#"{"Error Message":"Invalid API call"}"#.to_string()),
            Err(()),
            Ok(price_payload(200.0)),
        ]);
        let sink = Arc::new(CaptureSink::default());
        let engine = QuotingEngine::new(fast_config("REALKEY"), feed, sink.clone());
        let latest = engine.latest_quote();

        run_until(engine, sink.clone(), |s| s.reports.lock().unwrap().len() >= 2).await;

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        // strictly increasing, 1:1 with successful fetches
        assert_eq!(reports[0].cycle, 1);
        assert_eq!(reports[1].cycle, 2);
        assert_eq!(reports[0].mid, 123.45);
        assert_eq!(reports[1].mid, 200.0);
        // the two failed fetches left no trace beyond the gap
        let quote = latest.lock().unwrap().clone().unwrap();
        assert_eq!(quote.last_price, 200.0);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_quote() {
        let feed = ScriptedFeed::new(vec![
            Ok(price_payload(123.45)),
            Ok(r#"{"05. price":"not-a-number"}"#.to_string()),
        ]);
        let sink = Arc::new(CaptureSink::default());
        let engine = QuotingEngine::new(fast_config("REALKEY"), feed, sink.clone());
        let latest = engine.latest_quote();

        run_until(engine, sink.clone(), |s| !s.reports.lock().unwrap().is_empty()).await;

        // the unparseable payload after cycle 1 must not clobber the quote
        let quote = latest.lock().unwrap().clone().unwrap();
        assert_eq!(quote.last_price, 123.45);
        assert_eq!(sink.reports.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_derived_quote_straddles_mid() {
        let feed = ScriptedFeed::new(vec![Ok(price_payload(123.45))]);
        let sink = Arc::new(CaptureSink::default());
        let engine = QuotingEngine::new(fast_config("REALKEY"), feed, sink.clone());

        run_until(engine, sink.clone(), |s| !s.reports.lock().unwrap().is_empty()).await;

        let reports = sink.reports.lock().unwrap();
        let r = &reports[0];
        assert!(r.bid < r.mid && r.mid < r.ask);
        assert!((r.bid - 123.388275).abs() < 1e-9);
        assert!((r.ask - 123.511725).abs() < 1e-9);
        assert_eq!(r.market_low, Some(122.0));
        assert_eq!(r.market_high, Some(125.0));
    }

    #[tokio::test]
    async fn test_stop_before_start_and_idempotence() {
        let feed = ScriptedFeed::new(vec![Ok(price_payload(123.45))]);
        let sink = Arc::new(CaptureSink::default());
        let engine = QuotingEngine::new(fast_config("REALKEY"), feed, sink.clone());
        let handle = engine.handle();

        assert_eq!(handle.state(), EngineState::Idle);
        handle.request_stop();
        handle.request_stop(); // second call is a no-op
        assert_eq!(handle.state(), EngineState::Stopping);

        engine.run().await;
        assert_eq!(handle.state(), EngineState::Stopped);
        assert!(sink.reports.lock().unwrap().is_empty());

        // stopping an already stopped engine changes nothing
        handle.request_stop();
        assert_eq!(handle.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_limited_mode_warns_once_after_threshold() {
        let feed = ScriptedFeed::new(vec![Ok(price_payload(123.45)); 10]);
        let sink = Arc::new(CaptureSink::default());
        let engine = QuotingEngine::new(fast_config(crate::engine::types::DEMO_API_KEY), feed, sink.clone());

        run_until(engine, sink.clone(), |s| s.reports.lock().unwrap().len() >= 8).await;

        // threshold is 6 successful cycles; warning fires exactly once
        assert!(sink.reports.lock().unwrap().len() >= 8);
        assert_eq!(sink.advisories.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unlimited_mode_never_warns() {
        let feed = ScriptedFeed::new(vec![Ok(price_payload(123.45)); 10]);
        let sink = Arc::new(CaptureSink::default());
        let engine = QuotingEngine::new(fast_config("REALKEY"), feed, sink.clone());

        run_until(engine, sink.clone(), |s| s.reports.lock().unwrap().len() >= 8).await;

        assert!(sink.advisories.lock().unwrap().is_empty());
    }
}
