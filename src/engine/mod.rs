// Engine module entrypoint
pub mod maker; // quoting run loop + stop handle
pub mod types; // config, derived market, reports, lifecycle states

pub use maker::{CycleError, EngineHandle, QuotingEngine};
pub use types::{CycleReport, DerivedMarket, EngineConfig, EngineState, LatencyBand, DEMO_API_KEY};
