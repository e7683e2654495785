//! Scaleprobe execution engine
//!
//! Everything that happens while a test matrix runs: finding a reachable
//! endpoint, driving load, turning measurements into results and stepping
//! each test through its phases.

pub mod analyzer;
pub mod error;
pub mod input;
pub mod load;
pub mod orchestrator;
pub mod resolver;

// Re-export main types
pub use analyzer::{counter_increase, instance_power, is_load_balanced, Analyzer};
pub use error::{HarnessError, HarnessResult};
pub use input::{InputGenerator, InputStream};
pub use load::{LoadDriver, LoadRun};
pub use orchestrator::{
    plan_tests, stop_condition_from_config, Orchestrator, RunReport, StopReason,
};
pub use resolver::{
    strategies_from_config, ConnectionStrategy, PortForwardStrategy, Prober, Resolver,
    UrlStrategy,
};
