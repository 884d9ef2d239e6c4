//! Records, tokens and bootstrap outcomes exchanged with the log service.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::shipping::error::EndpointError;

/// Opaque value the service hands back after each append.
///
/// The next append to the same stream must present exactly this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContinuationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ContinuationToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line in a remote log stream. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: SystemTime,
    pub message: String,
}

impl LogRecord {
    /// Stamp a message with the current wall-clock time.
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            message: message.into(),
        }
    }

    /// Milliseconds since the Unix epoch, the service's wire representation.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }
}

/// Result of a create-if-absent call against the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExisted,
    Failed(String),
}

impl EnsureOutcome {
    /// Fold a create call's result; `AlreadyExists` is not a failure.
    pub fn from_result(result: Result<(), EndpointError>) -> Self {
        match result {
            Ok(()) => EnsureOutcome::Created,
            Err(EndpointError::AlreadyExists(_)) => EnsureOutcome::AlreadyExisted,
            Err(e) => EnsureOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EnsureOutcome::Failed(_))
    }
}
