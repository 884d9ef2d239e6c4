//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Static asset directory served by the web application.
    pub static_files: StaticFilesConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Remote log shipping settings.
    pub shipper: ShipperConfig,

    /// Which responses are reported to the shipper.
    pub reporting: ReportingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Static file serving.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory holding the public assets.
    pub root: String,

    /// File served for `/`, relative to `root`.
    pub index: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: "public".to_string(),
            index: "index.html".to_string(),
        }
    }
}

/// Timeout configuration for the HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics listener.
    pub metrics_enabled: bool,

    /// Metrics listener bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9100".to_string(),
        }
    }
}

/// Which remote endpoint implementation the shipper talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// CloudWatch Logs JSON API over HTTPS.
    #[default]
    CloudWatch,
    /// In-process stream store, for local development.
    Memory,
}

/// Remote log shipping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShipperConfig {
    /// Enable shipping of error responses.
    pub enabled: bool,

    /// Endpoint implementation.
    pub backend: EndpointKind,

    /// Service region, used to derive the default endpoint URL.
    pub region: String,

    /// Log group receiving the records.
    pub group_name: String,

    /// Log stream receiving the records.
    pub stream_name: String,

    /// Override for the service URL (e.g. a local emulator).
    pub endpoint_url: Option<String>,

    /// Deadline for every remote call, in milliseconds.
    pub timeout_ms: u64,

    /// Extra append attempts after a stale token rejection.
    pub max_retries: u32,

    /// Re-run group/stream creation before every append instead of once.
    pub ensure_each_submit: bool,

    /// Headers added to every request (authorization is supplied here).
    pub headers: BTreeMap<String, String>,
}

impl ShipperConfig {
    /// Deadline applied to each remote call.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Service URL, explicit or derived from the region.
    pub fn resolved_endpoint_url(&self) -> String {
        match &self.endpoint_url {
            Some(url) => url.clone(),
            None => format!("https://logs.{}.amazonaws.com/", self.region),
        }
    }

    /// Whether an `authorization` header is configured, in any letter case.
    pub fn has_authorization(&self) -> bool {
        self.headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("authorization"))
    }
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: EndpointKind::CloudWatch,
            region: "us-east-1".to_string(),
            group_name: "digai-logs".to_string(),
            stream_name: "digai-stream".to_string(),
            endpoint_url: None,
            timeout_ms: 5_000,
            max_retries: 1,
            ensure_each_submit: false,
            headers: BTreeMap::new(),
        }
    }
}

/// Error reporting thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Responses with a status at or above this are shipped.
    pub error_status_threshold: u16,

    /// Error reports allowed to wait on or run in the shipper at once.
    /// Reports beyond this are dropped, not queued.
    pub max_in_flight: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            error_status_threshold: 400,
            max_in_flight: 64,
        }
    }
}
