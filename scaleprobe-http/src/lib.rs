//! HTTP access to the service under test
//!
//! [`TargetClient`] is the seam the resolver and the load driver talk to;
//! [`HttpTarget`] implements it on a pooled `reqwest` client.

pub mod client;
pub mod config;
pub mod errors;

pub use client::{check_probe_response, HttpTarget, TargetClient, TargetResponse};
pub use config::HttpClientConfig;
pub use errors::HttpError;
