//! Ordered request validation.

use std::convert::Infallible;
use std::time::Instant;

use admission_core::{AdmissionError, ErrorKind, EventListeners};
use admission_context::{Severity, ThreatDetectedEvent, ThreatKind, ThreatRecord};

use crate::config::{normalize_content_type, SanitizerConfig};
use crate::json_limits;
use crate::patterns::PatternSet;

/// What the sanitizer requires about an inbound request. Kept deliberately
/// narrow (no dependency on any particular HTTP framework type) so the
/// gate crate can adapt whatever request type it wires up.
pub struct SanitizerInput<'a> {
    pub method_is_get: bool,
    pub declared_content_length: Option<usize>,
    pub content_type: Option<&'a str>,
    pub header_names: Vec<&'a str>,
    pub path: &'a str,
    pub query_pairs: Vec<(&'a str, &'a str)>,
    pub body: &'a [u8],
    pub request_id: &'a str,
    pub endpoint_pattern: &'a str,
}

/// The result of a successful sanitization pass: accumulated threats and
/// the (possibly JSON-truncated) body to pass downstream.
#[derive(Debug)]
pub struct SanitizeOutcome {
    pub threats: Vec<ThreatRecord>,
    pub sanitized_body: Vec<u8>,
}

pub struct Sanitizer {
    config: SanitizerConfig,
    patterns: PatternSet,
    threat_listeners: EventListeners<ThreatDetectedEvent>,
}

impl Sanitizer {
    pub fn new(config: SanitizerConfig) -> Self {
        Self {
            config,
            patterns: PatternSet::standard(),
            threat_listeners: EventListeners::new(),
        }
    }

    /// Registers a listener invoked for every [`ThreatRecord`] the
    /// sanitizer records, mirroring the `on_state_transition`
    /// builder-style hook.
    pub fn on_threat_detected<L>(&mut self, listener: L)
    where
        L: admission_core::EventListener<ThreatDetectedEvent> + 'static,
    {
        self.threat_listeners.add(listener);
    }

    /// Runs the ordered checks in, short-circuiting on the first
    /// structural violation (size, content-type, required headers), then
    /// collecting pattern/JSON-shape threats and rejecting if any is
    /// "critical".
    pub fn sanitize<E>(&self, input: &SanitizerInput<'_>) -> Result<SanitizeOutcome, AdmissionError<E>> {
        if let Some(len) = input.declared_content_length {
            if len > self.config.max_body_len {
                return Err(AdmissionError::rejected_with_status(
                    ErrorKind::InvalidRequest,
                    format!("body length {len} exceeds the configured maximum"),
                    413,
                ));
            }
        }

        let normalized_content_type = input.content_type.map(normalize_content_type);
        let content_type_allowed = match &normalized_content_type {
            None => input.method_is_get,
            Some(ct) => self.config.allowed_content_types.iter().any(|allowed| allowed == ct),
        };
        if !content_type_allowed {
            return Err(AdmissionError::rejected(
                ErrorKind::UnsupportedMediaType,
                "content-type is not in the allowed list",
            ));
        }

        for required in &self.config.required_headers {
            if !input.header_names.iter().any(|h| h.eq_ignore_ascii_case(required)) {
                return Err(AdmissionError::rejected(
                    ErrorKind::InvalidRequest,
                    format!("missing required header '{required}'"),
                ));
            }
        }

        let mut threats = Vec::new();
        self.scan_text_into(&mut threats, "path", input.path);
        for (name, value) in &input.query_pairs {
            self.scan_text_into(&mut threats, &format!("query.{name}"), value);
        }

        let sanitized_body = self.scan_body(&normalized_content_type, input.body, &mut threats);

        for threat in &threats {
            self.emit_threat(input, threat.clone());
        }

        if threats.iter().any(ThreatRecord::is_critical) {
            return Err(AdmissionError::rejected(
                ErrorKind::InvalidRequest,
                "request rejected: a critical threat pattern was detected",
            ));
        }

        Ok(SanitizeOutcome {
            threats,
            sanitized_body,
        })
    }

    fn scan_body(&self, content_type: &Option<String>, body: &[u8], threats: &mut Vec<ThreatRecord>) -> Vec<u8> {
        if body.is_empty() {
            return Vec::new();
        }

        let Ok(text) = std::str::from_utf8(body) else {
            threats.push(ThreatRecord::new(
                ThreatKind::MalformedJson,
                Severity::Info,
                "body",
                "non-utf8-body",
                "<unreadable body>",
            ));
            return body.to_vec();
        };

        if content_type.as_deref() == Some("application/json") {
            match serde_json::from_str::<serde_json::Value>(text) {
                Ok(value) => {
                    self.scan_json_strings_into(threats, "$", &value);
                    let (truncated, mut json_threats) = json_limits::enforce(value, &self.config.json_limits);
                    threats.append(&mut json_threats);
                    serde_json::to_vec(&truncated).unwrap_or_else(|_| body.to_vec())
                }
                Err(_) => {
                    threats.push(ThreatRecord::new(
                        ThreatKind::MalformedJson,
                        Severity::Medium,
                        "body",
                        "json-parse-error",
                        &text[..text.len().min(80)],
                    ));
                    body.to_vec()
                }
            }
        } else {
            self.scan_text_into(threats, "body", text);
            body.to_vec()
        }
    }

    fn scan_json_strings_into(&self, threats: &mut Vec<ThreatRecord>, path: &str, value: &serde_json::Value) {
        match value {
            serde_json::Value::String(s) => self.scan_text_into(threats, path, s),
            serde_json::Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.scan_json_strings_into(threats, &format!("{path}[{i}]"), item);
                }
            }
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    self.scan_json_strings_into(threats, &format!("{path}.{k}"), v);
                }
            }
            _ => {}
        }
    }

    fn scan_text_into(&self, threats: &mut Vec<ThreatRecord>, field_path: &str, text: &str) {
        for pattern_match in self.patterns.scan(text) {
            threats.push(ThreatRecord::new(
                pattern_match.kind,
                pattern_match.severity,
                field_path,
                pattern_match.pattern_name,
                text,
            ));
        }
    }

    fn emit_threat(&self, input: &SanitizerInput<'_>, record: ThreatRecord) {
        if self.threat_listeners.is_empty() {
            return;
        }
        self.threat_listeners.emit(&ThreatDetectedEvent {
            request_id: input.request_id.to_string(),
            endpoint_pattern: input.endpoint_pattern.to_string(),
            record,
            timestamp: Instant::now(),
        });
    }
}

/// Convenience alias used by callers that don't have a business-handler
/// error type in scope yet (the sanitizer never produces one itself).
pub type SanitizerResult = Result<SanitizeOutcome, AdmissionError<Infallible>>;
