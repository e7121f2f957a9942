//! Umbrella crate wiring the four admission-pattern crates into one axum
//! service, grounded on the top-level
//! `tower-resilience` crate, which plays the same role for its pattern
//! crates.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod router;

pub use cli::Cli;
pub use config::{GateConfig, GateConfigBuilder, GateConfigFile, ServiceBreaker};
pub use error::DownstreamError;
pub use pipeline::{AdmissionPipeline, GateJob};
pub use router::{build_router, AppState};
