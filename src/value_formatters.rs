//! Key and value formatters.
//!
//! Translates field names and scalar attribute values between their domain
//! form (as declared on a [`crate::descriptors::FieldDescriptor`]) and their
//! wire form. Kept as small, independently testable pure functions.

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use crate::descriptors::{DateAttributeOptions, UrlAttributeOptions};

/// Formats domain field names into wire field names.
///
/// The default formatter dashes camelCase into kebab-case, matching the
/// `to-one-attribute` style JSON:API servers in the wild tend to use, and
/// the style this crate's own test scenarios assert against.
pub trait KeyFormatter: Send + Sync {
    fn format(&self, name: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DasherizingKeyFormatter;

impl KeyFormatter for DasherizingKeyFormatter {
    fn format(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 4);
        for (i, ch) in name.chars().enumerate() {
            if ch.is_uppercase() {
                if i != 0 {
                    out.push('-');
                }
                out.extend(ch.to_lowercase());
            } else {
                out.push(ch);
            }
        }
        out
    }
}

/// Leaves names untouched; useful when a server already speaks camelCase.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKeyFormatter;

impl KeyFormatter for IdentityKeyFormatter {
    fn format(&self, name: &str) -> String {
        name.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValueFormatError {
    #[error("expected a boolean-coercible value, got {0}")]
    NotBoolean(Value),
    #[error("expected a date string in format '{format}', got {value}")]
    InvalidDate { format: String, value: Value },
    #[error("expected a URL string, got {0}")]
    InvalidUrl(Value),
}

/// Coerces wire values into domain values and back, per attribute kind.
///
/// This is a registry (rather than free functions) so embedding
/// applications can swap in custom date/bool coercion without touching the
/// descriptors themselves — mirroring how the wider corpus keeps formatting
/// concerns behind a small injectable collaborator instead of hardcoding
/// them into the mapping layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueFormatterRegistry;

impl ValueFormatterRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Coerce a wire JSON value for a boolean attribute.
    pub fn format_boolean_in(&self, value: &Value) -> Result<bool, ValueFormatError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => match s.as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                _ => Err(ValueFormatError::NotBoolean(value.clone())),
            },
            _ => Err(ValueFormatError::NotBoolean(value.clone())),
        }
    }

    pub fn format_boolean_out(&self, value: bool) -> Value {
        Value::Bool(value)
    }

    /// Parse a wire date string into a UTC timestamp. The descriptor's
    /// `format` is informational for round-tripping custom formats in a
    /// fuller implementation; this core always accepts RFC 3339 / ISO-8601,
    /// which is what `DEFAULT_DATE_FORMAT` describes.
    pub fn format_date_in(
        &self,
        value: &Value,
        options: &DateAttributeOptions,
    ) -> Result<DateTime<Utc>, ValueFormatError> {
        let Some(s) = value.as_str() else {
            return Err(ValueFormatError::InvalidDate { format: options.format.clone(), value: value.clone() });
        };
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ValueFormatError::InvalidDate { format: options.format.clone(), value: value.clone() })
    }

    pub fn format_date_out(&self, value: &DateTime<Utc>, _options: &DateAttributeOptions) -> Value {
        Value::String(value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }

    /// Resolve a wire URL string, relative to `base_url` when necessary.
    pub fn format_url_in(&self, value: &Value, options: &UrlAttributeOptions) -> Result<Url, ValueFormatError> {
        let Some(s) = value.as_str() else {
            return Err(ValueFormatError::InvalidUrl(value.clone()));
        };
        if let Ok(absolute) = Url::parse(s) {
            return Ok(absolute);
        }
        if let Some(base) = &options.base_url {
            if let Ok(base_url) = Url::parse(base) {
                if let Ok(joined) = base_url.join(s) {
                    return Ok(joined);
                }
            }
        }
        Err(ValueFormatError::InvalidUrl(value.clone()))
    }

    pub fn format_url_out(&self, value: &Url) -> Value {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dasherizes_camel_case() {
        let f = DasherizingKeyFormatter;
        assert_eq!(f.format("toOneAttribute"), "to-one-attribute");
        assert_eq!(f.format("stringAttribute"), "string-attribute");
        assert_eq!(f.format("id"), "id");
    }

    #[test]
    fn boolean_coercion_accepts_truthy_strings() {
        let registry = ValueFormatterRegistry::new();
        assert!(registry.format_boolean_in(&Value::String("true".into())).unwrap());
        assert!(!registry.format_boolean_in(&Value::String("false".into())).unwrap());
        assert!(registry.format_boolean_in(&Value::Bool(true)).unwrap());
    }

    #[test]
    fn date_round_trips_through_rfc3339() {
        let registry = ValueFormatterRegistry::new();
        let options = DateAttributeOptions::default();
        let value = Value::String("2024-01-15T10:30:00.000Z".to_string());
        let parsed = registry.format_date_in(&value, &options).unwrap();
        let back = registry.format_date_out(&parsed, &options);
        assert_eq!(back, Value::String("2024-01-15T10:30:00.000Z".to_string()));
    }

    #[test]
    fn url_resolves_against_base() {
        let registry = ValueFormatterRegistry::new();
        let options = UrlAttributeOptions { base_url: Some("http://example.com/".to_string()) };
        let value = Value::String("foos/1".to_string());
        let resolved = registry.format_url_in(&value, &options).unwrap();
        assert_eq!(resolved.as_str(), "http://example.com/foos/1");
    }

    #[test]
    fn url_absolute_values_ignore_base() {
        let registry = ValueFormatterRegistry::new();
        let options = UrlAttributeOptions { base_url: Some("http://example.com/".to_string()) };
        let value = Value::String("http://other.com/x".to_string());
        let resolved = registry.format_url_in(&value, &options).unwrap();
        assert_eq!(resolved.as_str(), "http://other.com/x");
    }
}
