//! Request context propagation and response shaping for the admission
//! pipeline: the descriptor every stage reads, threat
//! annotations the sanitizer attaches to it, client-version negotiation,
//! request ID handling, and the stable rejection envelope every stage
//! renders through.

pub mod descriptor;
pub mod request_id;
pub mod response;
pub mod threat;
pub mod version;

pub use descriptor::RequestDescriptor;
pub use response::{ErrorDetails, ErrorEnvelope, RateLimitHeaders, Rejection};
pub use threat::{Severity, ThreatDetectedEvent, ThreatKind, ThreatListeners, ThreatRecord};
pub use version::{negotiate as negotiate_version, VersionConfig, VersionOutcome};
