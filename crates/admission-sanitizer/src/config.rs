//! Sanitizer configuration, built with the same
//! `*ConfigBuilder` pattern the rest of the pipeline uses.

/// Per-field JSON recursion limits.
#[derive(Debug, Clone)]
pub struct JsonLimits {
    pub max_depth: usize,
    pub max_array_len: usize,
    pub max_string_len: usize,
}

impl Default for JsonLimits {
    fn default() -> Self {
        Self {
            max_depth: 16,
            max_array_len: 1_000,
            max_string_len: 16_384,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    pub max_body_len: usize,
    pub allowed_content_types: Vec<String>,
    pub required_headers: Vec<String>,
    pub json_limits: JsonLimits,
}

impl SanitizerConfig {
    pub fn builder() -> SanitizerConfigBuilder {
        SanitizerConfigBuilder::default()
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            max_body_len: 1024 * 1024,
            allowed_content_types: vec!["application/json".to_string()],
            required_headers: Vec::new(),
            json_limits: JsonLimits::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SanitizerConfigBuilder {
    max_body_len: Option<usize>,
    allowed_content_types: Vec<String>,
    required_headers: Vec<String>,
    json_limits: Option<JsonLimits>,
}

impl SanitizerConfigBuilder {
    pub fn max_body_len(mut self, bytes: usize) -> Self {
        self.max_body_len = Some(bytes);
        self
    }

    pub fn allow_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.allowed_content_types.push(content_type.into());
        self
    }

    pub fn require_header(mut self, header: impl Into<String>) -> Self {
        self.required_headers.push(header.into());
        self
    }

    pub fn json_limits(mut self, limits: JsonLimits) -> Self {
        self.json_limits = Some(limits);
        self
    }

    pub fn build(self) -> SanitizerConfig {
        let defaults = SanitizerConfig::default();
        SanitizerConfig {
            max_body_len: self.max_body_len.unwrap_or(defaults.max_body_len),
            allowed_content_types: if self.allowed_content_types.is_empty() {
                defaults.allowed_content_types
            } else {
                self.allowed_content_types
            },
            required_headers: self.required_headers,
            json_limits: self.json_limits.unwrap_or(defaults.json_limits),
        }
    }
}

/// Strips parameters from a `Content-Type` header value, e.g.
/// `application/json; charset=utf-8` -> `application/json`.
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or(raw).trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_content_type_parameters() {
        assert_eq!(
            normalize_content_type("application/json; charset=utf-8"),
            "application/json"
        );
    }

    #[test]
    fn builder_falls_back_to_defaults() {
        let config = SanitizerConfig::builder().build();
        assert_eq!(config.allowed_content_types, vec!["application/json"]);
        assert_eq!(config.max_body_len, 1024 * 1024);
    }

    #[test]
    fn builder_overrides_are_applied() {
        let config = SanitizerConfig::builder()
            .max_body_len(2048)
            .allow_content_type("text/plain")
            .require_header("x-api-key")
            .build();
        assert_eq!(config.max_body_len, 2048);
        assert_eq!(config.allowed_content_types, vec!["text/plain"]);
        assert_eq!(config.required_headers, vec!["x-api-key"]);
    }
}
