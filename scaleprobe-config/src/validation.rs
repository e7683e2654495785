//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate that a float is finite and at least `min`
pub fn validate_at_least(value: f64, min: f64, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !value.is_finite() || value < min {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be a finite number >= {}, got {}", field_name, min, value),
        });
    }
    Ok(())
}

/// Validate an http(s) URL
pub fn validate_http_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(url, field_name, domain)?;

    let parsed = url::Url::parse(url).map_err(|e| ConfigError::DomainError {
        domain: domain.to_string(),
        message: format!("{} has invalid URL format: {}", field_name, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} scheme '{}' not supported (only http/https)", field_name, scheme),
        }),
    }
}

/// Validate a request path template
pub fn validate_path(path: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must start with '/', got '{}'", field_name, path),
        });
    }
    Ok(())
}

/// Validate a port number
pub fn validate_port(port: u16, field_name: &str, domain: &str) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be 0", field_name),
        });
    }

    if port <= 1023 {
        log::warn!("{} port {} is in the reserved range (1-1023)", field_name, port);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://localhost:9090", "url", "metrics").is_ok());
        assert!(validate_http_url("https://prom.example.com", "url", "metrics").is_ok());
        assert!(validate_http_url("", "url", "metrics").is_err());
        assert!(validate_http_url("not-a-url", "url", "metrics").is_err());
        assert!(validate_http_url("ftp://example.com", "url", "metrics").is_err());
    }

    #[test]
    fn test_validate_at_least() {
        assert!(validate_at_least(1.5, 1.0, "fairness_threshold", "analysis").is_ok());
        assert!(validate_at_least(0.5, 1.0, "fairness_threshold", "analysis").is_err());
        assert!(validate_at_least(f64::NAN, 0.0, "x", "analysis").is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("/factorial/{n}", "request_path", "target").is_ok());
        assert!(validate_path("factorial", "request_path", "target").is_err());
    }
}
