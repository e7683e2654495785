//! Logging setup for scaleprobe
//!
//! Events from both `tracing` and `log` end up in one subscriber, filtered
//! by `RUST_LOG` when it is set and by the configured level otherwise.

mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing, LoggingGuard};
