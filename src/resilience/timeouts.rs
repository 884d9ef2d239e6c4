//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap remote calls with a deadline
//! - Cancel the call cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::shipping::EndpointError;

/// Run an endpoint call, failing with `EndpointError::Timeout` past `deadline`.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, EndpointError>
where
    F: Future<Output = Result<T, EndpointError>>,
{
    match timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(EndpointError::Timeout(deadline)),
    }
}
