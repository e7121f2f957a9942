//! Precompiled attack-pattern sets for path/query/body scanning.
//!
//! Patterns are compiled once, at construction, and shared via `Arc` the
//! same way a `tower_resilience_circuitbreaker::SharedFailureClassifier` is
//! built once and handed out to every call through `Arc<Config>` — scanning
//! a request never pays regex-compilation cost.

use regex::Regex;

use admission_context::{Severity, ThreatKind};

/// One named pattern within a category, carrying the severity a match
/// should be recorded at.
struct Pattern {
    name: &'static str,
    regex: Regex,
    severity: Severity,
}

/// The full set of precompiled detectors the sanitizer scans input against.
pub struct PatternSet {
    traversal: Vec<Pattern>,
    xss: Vec<Pattern>,
    sqli: Vec<Pattern>,
}

/// A single match against the pattern set, ready to become a [`ThreatRecord`]
/// once the caller supplies the field path and evidence.
pub struct PatternMatch {
    pub kind: ThreatKind,
    pub severity: Severity,
    pub pattern_name: &'static str,
}

impl PatternSet {
    /// Builds the default pattern set. Mirrors the well-known OWASP sample
    /// patterns for path traversal, reflected XSS, and SQL injection —
    /// deliberately conservative (a few high-signal patterns) rather than an
    /// exhaustive signature database, which belongs in a real WAF, not here.
    pub fn standard() -> Self {
        Self {
            traversal: vec![
                Pattern {
                    name: "dot_dot_slash",
                    regex: Regex::new(r"(\.\./|\.\.\\)").unwrap(),
                    severity: Severity::High,
                },
                Pattern {
                    name: "encoded_dot_dot",
                    regex: Regex::new(r"(?i)%2e%2e(%2f|%5c|/)").unwrap(),
                    severity: Severity::High,
                },
                Pattern {
                    name: "etc_passwd",
                    regex: Regex::new(r"(?i)/etc/passwd").unwrap(),
                    severity: Severity::High,
                },
            ],
            xss: vec![
                Pattern {
                    name: "script_tag",
                    regex: Regex::new(r"(?i)<script[\s>]").unwrap(),
                    severity: Severity::High,
                },
                Pattern {
                    name: "javascript_uri",
                    regex: Regex::new(r"(?i)javascript:").unwrap(),
                    severity: Severity::High,
                },
                Pattern {
                    name: "on_event_handler",
                    regex: Regex::new(r"(?i)\bon[a-z]+\s*=\s*['\x22]").unwrap(),
                    severity: Severity::High,
                },
            ],
            sqli: vec![
                Pattern {
                    name: "union_select",
                    regex: Regex::new(r"(?i)\bunion\b.{0,40}\bselect\b").unwrap(),
                    severity: Severity::Critical,
                },
                Pattern {
                    name: "tautology_or",
                    regex: Regex::new(r"(?i)\bor\b\s+['\x22]?\s*1\s*=\s*1").unwrap(),
                    severity: Severity::Critical,
                },
                Pattern {
                    name: "stacked_drop_table",
                    regex: Regex::new(r"(?i);\s*drop\s+table\b").unwrap(),
                    severity: Severity::Critical,
                },
                Pattern {
                    name: "comment_terminator",
                    regex: Regex::new(r"--\s").unwrap(),
                    severity: Severity::Medium,
                },
            ],
        }
    }

    /// Scans `text` against every category, returning every match found.
    pub fn scan(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        matches.extend(self.scan_category(&self.traversal, ThreatKind::PathTraversal, text));
        matches.extend(self.scan_category(&self.xss, ThreatKind::CrossSiteScripting, text));
        matches.extend(self.scan_category(&self.sqli, ThreatKind::SqlInjection, text));
        matches
    }

    fn scan_category(&self, patterns: &[Pattern], kind: ThreatKind, text: &str) -> Vec<PatternMatch> {
        patterns
            .iter()
            .filter(|p| p.regex.is_match(text))
            .map(|p| PatternMatch {
                kind,
                severity: p.severity,
                pattern_name: p.name,
            })
            .collect()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sql_injection_as_critical() {
        let set = PatternSet::standard();
        let matches = set.scan("'; DROP TABLE users --");
        assert!(matches
                .iter()
                .any(|m| m.kind == ThreatKind::SqlInjection && m.severity == Severity::Critical));
    }

    #[test]
    fn detects_script_tag_xss() {
        let set = PatternSet::standard();
        let matches = set.scan("<script>alert(1)</script>");
        assert!(matches.iter().any(|m| m.kind == ThreatKind::CrossSiteScripting));
    }

    #[test]
    fn detects_path_traversal() {
        let set = PatternSet::standard();
        let matches = set.scan("../../etc/passwd");
        assert!(matches.iter().any(|m| m.kind == ThreatKind::PathTraversal));
    }

    #[test]
    fn benign_text_has_no_matches() {
        let set = PatternSet::standard();
        assert!(set.scan("just a normal search query").is_empty());
    }
}
