//! Threat annotations attached to a request's propagated context.
//! Populated by `admission-sanitizer`, carried alongside the
//! [`crate::descriptor::RequestDescriptor`] for the rest of the chain and for
//! logging.

use admission_core::{AdmissionEvent, EventListeners};

/// How severe a detected threat is. Ordered from least to most severe.
///
/// The wire/log value for the top tier is `"critical"`, not `"severityCritical"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// The kind of pattern a threat record matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatKind {
    SqlInjection,
    CrossSiteScripting,
    PathTraversal,
    OversizedPayload,
    MalformedJson,
}

impl ThreatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreatKind::SqlInjection => "sql_injection",
            ThreatKind::CrossSiteScripting => "xss",
            ThreatKind::PathTraversal => "path_traversal",
            ThreatKind::OversizedPayload => "oversized_payload",
            ThreatKind::MalformedJson => "malformed_json",
        }
    }
}

/// One detected threat: what matched, where, and how severe it is.
#[derive(Debug, Clone)]
pub struct ThreatRecord {
    pub kind: ThreatKind,
    pub severity: Severity,
    /// Dotted/bracketed field path within the request where the match
    /// occurred, e.g. `body.query` or `query.search[0]`.
    pub field_path: String,
    pub matched_pattern: String,
    /// A short, truncated excerpt of the offending input for diagnostics.
    /// Never the full payload — caps this to avoid turning the
    /// sanitizer into a log-amplification vector.
    pub evidence: String,
}

impl ThreatRecord {
    pub fn new(
        kind: ThreatKind,
        severity: Severity,
        field_path: impl Into<String>,
        matched_pattern: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        const MAX_EVIDENCE_LEN: usize = 120;
        let mut evidence = evidence.into();
        if evidence.len() > MAX_EVIDENCE_LEN {
            evidence.truncate(MAX_EVIDENCE_LEN);
            evidence.push('…');
        }
        Self {
            kind,
            severity,
            field_path: field_path.into(),
            matched_pattern: matched_pattern.into(),
            evidence,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Emitted through [`EventListeners`] whenever the sanitizer records a
/// [`ThreatRecord`], mirroring the way `tower_resilience_circuitbreaker`
/// emits a state-transition event per observation.
#[derive(Debug, Clone)]
pub struct ThreatDetectedEvent {
    pub request_id: String,
    pub endpoint_pattern: String,
    pub record: ThreatRecord,
    pub timestamp: std::time::Instant,
}

impl AdmissionEvent for ThreatDetectedEvent {
    fn event_type(&self) -> &'static str {
        "threat_detected"
    }

    fn timestamp(&self) -> std::time::Instant {
        self.timestamp
    }

    fn stage_name(&self) -> &str {
        "sanitizer"
    }
}

pub type ThreatListeners = EventListeners<ThreatDetectedEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_severity_serializes_without_camel_case() {
        assert_eq!(Severity::Critical.as_str(), "critical");
    }

    #[test]
    fn evidence_is_truncated_with_an_ellipsis() {
        let record = ThreatRecord::new(
            ThreatKind::SqlInjection,
            Severity::High,
            "body.query",
            "' OR 1=1",
            "x".repeat(500),
        );
        assert!(record.evidence.ends_with('…'));
        assert!(record.evidence.len() < 500);
    }

    #[test]
    fn is_critical_reflects_severity() {
        let record = ThreatRecord::new(
            ThreatKind::PathTraversal,
            Severity::Critical,
            "path",
            "../../etc/passwd",
            "../../etc/passwd",
        );
        assert!(record.is_critical());
    }
}
