use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

static DNS_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid DNS subdomain regex")
});

static DNS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid DNS label regex"));

static QUALIFIED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").expect("valid qualified name regex")
});

/// Constraints applied to configured attribute values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    OneOf { values: Vec<String> },
    LengthBetween { min: Option<u64>, max: Option<u64> },
    Between { min: Option<f64>, max: Option<f64> },
    Pattern { pattern: String },
    /// RFC 1123 subdomain, as required for `metadata.name`
    DnsSubdomain,
    /// RFC 1123 label, as required for `metadata.namespace`
    DnsLabel,
    /// Qualified-name keys; values are checked too when `check_values` is set
    QualifiedKeys { check_values: bool },
}

impl Validator {
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Validator::OneOf { values } => {
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!("value must be one of: {:?}, got: {:?}", values, s))
                }
            }
            Validator::LengthBetween { min, max } => {
                let len = match value {
                    Value::String(s) => s.chars().count() as u64,
                    Value::Array(a) => a.len() as u64,
                    _ => return Ok(()),
                };
                if min.is_some_and(|m| len < m) || max.is_some_and(|m| len > m) {
                    Err(format!(
                        "length must be between {} and {}, got: {}",
                        bound(*min),
                        bound(*max),
                        len
                    ))
                } else {
                    Ok(())
                }
            }
            Validator::Between { min, max } => {
                let Some(n) = value.as_f64() else {
                    return Ok(());
                };
                if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                    Err(format!(
                        "value must be between {} and {}, got: {}",
                        bound(*min),
                        bound(*max),
                        n
                    ))
                } else {
                    Ok(())
                }
            }
            Validator::Pattern { pattern } => {
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                // OpenAPI patterns are ECMA 262; skip the ones the regex crate cannot compile
                match Regex::new(pattern) {
                    Ok(re) if !re.is_match(s) => {
                        Err(format!("value {:?} must match pattern {:?}", s, pattern))
                    }
                    Ok(_) => Ok(()),
                    Err(e) => {
                        trace!("Skipping unsupported pattern {}: {}", pattern, e);
                        Ok(())
                    }
                }
            }
            Validator::DnsSubdomain => {
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                if s.len() <= 253 && DNS_SUBDOMAIN.is_match(s) {
                    Ok(())
                } else {
                    Err(format!(
                        "{:?} is not a valid DNS subdomain (RFC 1123, at most 253 characters)",
                        s
                    ))
                }
            }
            Validator::DnsLabel => {
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                if s.len() <= 63 && DNS_LABEL.is_match(s) {
                    Ok(())
                } else {
                    Err(format!(
                        "{:?} is not a valid DNS label (RFC 1123, at most 63 characters)",
                        s
                    ))
                }
            }
            Validator::QualifiedKeys { check_values } => {
                let Some(entries) = value.as_object() else {
                    return Ok(());
                };
                for (key, v) in entries {
                    validate_qualified_key(key)?;
                    if *check_values {
                        if let Some(s) = v.as_str() {
                            if !s.is_empty() && (s.len() > 63 || !QUALIFIED_NAME.is_match(s)) {
                                return Err(format!("{:?} is not a valid label value", s));
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Short description used in generated documentation
    pub fn description(&self) -> String {
        match self {
            Validator::OneOf { values } => format!("one of {}", values.join(", ")),
            Validator::LengthBetween { min, max } => {
                format!("length between {} and {}", bound(*min), bound(*max))
            }
            Validator::Between { min, max } => {
                format!("between {} and {}", bound(*min), bound(*max))
            }
            Validator::Pattern { pattern } => format!("matches `{}`", pattern),
            Validator::DnsSubdomain => "a DNS subdomain".to_string(),
            Validator::DnsLabel => "a DNS label".to_string(),
            Validator::QualifiedKeys { .. } => "keys are qualified names".to_string(),
        }
    }
}

fn bound<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string())
}

fn validate_qualified_key(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.rsplit_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > 253 || !DNS_SUBDOMAIN.is_match(prefix) {
            return Err(format!("{:?} has an invalid prefix", key));
        }
    }
    if name.is_empty() || name.len() > 63 || !QUALIFIED_NAME.is_match(name) {
        return Err(format!("{:?} is not a valid qualified name", key));
    }
    Ok(())
}
