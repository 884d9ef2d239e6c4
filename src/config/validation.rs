//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, status codes)
//! - Enforce remote naming rules before the first request goes out
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::{AppConfig, EndpointKind, ShipperConfig};

/// Upper bound on stale-token retries; anything larger is a live-lock in disguise.
pub const MAX_STALE_RETRIES: u32 = 10;

const MAX_GROUP_NAME_LEN: usize = 512;
const MAX_STREAM_NAME_LEN: usize = 512;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check the whole configuration, collecting every error found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.static_files.index.is_empty() {
        errors.push(ValidationError::new("static_files.index", "must not be empty"));
    }

    let threshold = config.reporting.error_status_threshold;
    if !(100..=599).contains(&threshold) {
        errors.push(ValidationError::new(
            "reporting.error_status_threshold",
            format!("{} is not an HTTP status code", threshold),
        ));
    }

    if config.reporting.max_in_flight == 0 {
        errors.push(ValidationError::new(
            "reporting.max_in_flight",
            "must be greater than 0",
        ));
    }

    if config.shipper.enabled {
        validate_shipper(&config.shipper, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_shipper(shipper: &ShipperConfig, errors: &mut Vec<ValidationError>) {
    if shipper.group_name.is_empty() || shipper.group_name.len() > MAX_GROUP_NAME_LEN {
        errors.push(ValidationError::new(
            "shipper.group_name",
            format!("must be 1 to {} characters", MAX_GROUP_NAME_LEN),
        ));
    }

    if shipper.stream_name.is_empty() || shipper.stream_name.len() > MAX_STREAM_NAME_LEN {
        errors.push(ValidationError::new(
            "shipper.stream_name",
            format!("must be 1 to {} characters", MAX_STREAM_NAME_LEN),
        ));
    } else if shipper.stream_name.contains([':', '*']) {
        errors.push(ValidationError::new(
            "shipper.stream_name",
            "must not contain ':' or '*'",
        ));
    }

    if shipper.timeout_ms == 0 {
        errors.push(ValidationError::new("shipper.timeout_ms", "must be greater than 0"));
    }

    if shipper.max_retries > MAX_STALE_RETRIES {
        errors.push(ValidationError::new(
            "shipper.max_retries",
            format!("must be at most {}", MAX_STALE_RETRIES),
        ));
    }

    if shipper.backend == EndpointKind::CloudWatch {
        if shipper.endpoint_url.is_none() && shipper.region.is_empty() {
            errors.push(ValidationError::new(
                "shipper.region",
                "required when no endpoint_url is given",
            ));
        }

        if let Err(e) = url::Url::parse(&shipper.resolved_endpoint_url()) {
            errors.push(ValidationError::new(
                "shipper.endpoint_url",
                format!("invalid URL: {}", e),
            ));
        }
    }

    for (name, value) in &shipper.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "shipper.headers",
                format!("'{}' is not a valid header name", name),
            ));
        } else if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                "shipper.headers",
                format!("value for '{}' is not a valid header value", name),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.reporting.error_status_threshold = 42;
        config.reporting.max_in_flight = 0;
        config.shipper.stream_name = "web:*".into();
        config.shipper.max_retries = MAX_STALE_RETRIES + 1;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "reporting.error_status_threshold",
                "reporting.max_in_flight",
                "shipper.stream_name",
                "shipper.max_retries",
            ]
        );
    }

    #[test]
    fn test_disabled_shipper_is_not_checked() {
        let mut config = AppConfig::default();
        config.shipper.enabled = false;
        config.shipper.group_name.clear();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_bad_endpoint_url_and_headers() {
        let mut config = AppConfig::default();
        config.shipper.endpoint_url = Some("::not a url::".into());
        config
            .shipper
            .headers
            .insert("bad header".into(), "value".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "shipper.endpoint_url");
        assert_eq!(errors[1].field, "shipper.headers");
        assert!(errors[1].to_string().contains("bad header"));
    }

    #[test]
    fn test_memory_backend_skips_url_checks() {
        let mut config = AppConfig::default();
        config.shipper.backend = EndpointKind::Memory;
        config.shipper.region.clear();
        config.shipper.endpoint_url = Some("::not a url::".into());
        assert!(validate_config(&config).is_ok());
    }
}
