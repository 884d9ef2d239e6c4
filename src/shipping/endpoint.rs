//! The remote append-only log service, as seen by the shipper.

use async_trait::async_trait;

use crate::shipping::error::EndpointError;
use crate::shipping::types::{ContinuationToken, LogRecord};

/// Operations the shipper needs from a log-stream service.
///
/// The service is the source of truth for stream contents and tokens.
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait RemoteLogEndpoint: Send + Sync {
    /// Create a log group. Fails with `AlreadyExists` if it is there.
    async fn create_group(&self, group: &str) -> Result<(), EndpointError>;

    /// Create a stream inside an existing group.
    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), EndpointError>;

    /// Token of the first stream (by name) matching `stream_prefix`.
    ///
    /// `Ok(None)` means no match or an empty stream: no token is required.
    async fn current_token(
        &self,
        group: &str,
        stream_prefix: &str,
    ) -> Result<Option<ContinuationToken>, EndpointError>;

    /// Append a batch, presenting the token from the previous append.
    ///
    /// Returns the token the next append must present.
    async fn append(
        &self,
        group: &str,
        stream: &str,
        records: &[LogRecord],
        token: Option<&ContinuationToken>,
    ) -> Result<Option<ContinuationToken>, EndpointError>;
}
