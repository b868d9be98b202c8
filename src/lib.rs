// Display-only market maker simulation driven by a live quote feed.
pub mod engine;    // quoting loop, cadence, backoff, lifecycle
pub mod feed;      // fetch collaborators (Alpha Vantage adapter)
pub mod quote;     // payload scanning -> Quote
pub mod report;    // per-cycle sinks (console, JSON lines)
pub mod telemetry; // tracing + optional prometheus exporter
