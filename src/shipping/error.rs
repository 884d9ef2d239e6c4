//! Error types for remote log shipping.

use std::time::Duration;

use thiserror::Error;

use crate::shipping::types::ContinuationToken;

/// Failures reported by a [`RemoteLogEndpoint`](crate::shipping::RemoteLogEndpoint).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The group or stream being created is already there.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The group or stream addressed does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The token presented no longer matches the stream head.
    #[error("continuation token is stale")]
    StaleToken,

    /// The service already holds this exact batch.
    #[error("batch already accepted")]
    AlreadyAccepted { next: Option<ContinuationToken> },

    /// The call did not complete within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other error the service answered with.
    #[error("service error {code}: {message}")]
    Service { code: String, message: String },

    /// The service answered with a body we could not read.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request could not be built from the configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Hard failures returned from [`SequencedLogShipper::submit`](crate::shipping::SequencedLogShipper::submit).
///
/// Either way the message was not delivered.
#[derive(Debug, Error)]
pub enum ShipError {
    /// The append failed for a reason other than a stale token.
    #[error("append failed: {0}")]
    AppendFailed(#[source] EndpointError),

    /// Every attempt was rejected as stale.
    #[error("append still stale after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
}

/// Steps whose failure is logged and counted but never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftFailure {
    GroupCreate,
    StreamCreate,
    TokenFetch,
}

impl SoftFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoftFailure::GroupCreate => "group_create",
            SoftFailure::StreamCreate => "stream_create",
            SoftFailure::TokenFetch => "token_fetch",
        }
    }
}
