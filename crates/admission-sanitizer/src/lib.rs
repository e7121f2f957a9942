//! Input sanitization and validation: the first stage of the
//! admission chain. Rejects malformed, oversized, or attack-pattern input
//! without mutating semantic payloads; everything else is annotated with
//! threat records and passed through.

pub mod config;
pub mod json_limits;
pub mod patterns;
pub mod sanitizer;

pub use config::{JsonLimits, SanitizerConfig, SanitizerConfigBuilder};
pub use patterns::PatternSet;
pub use sanitizer::{SanitizeOutcome, Sanitizer, SanitizerInput, SanitizerResult};
