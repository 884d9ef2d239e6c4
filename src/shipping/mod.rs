//! Remote log shipping subsystem.
//!
//! # Data Flow
//! ```text
//! caller (HTTP middleware, shipctl)
//!     → shipper.rs (serialize per stream, bootstrap, token, bounded retry)
//!     → endpoint.rs (RemoteLogEndpoint trait)
//!         → cloudwatch.rs (JSON API over HTTPS)
//!         → memory.rs (in-process, strict tokens)
//! ```
//!
//! # Design Decisions
//! - The shipper is the only owner of the cached continuation token
//! - Soft failures (creates, token lookup) are logged, never returned
//! - Every remote call runs under the configured deadline

pub mod cloudwatch;
pub mod endpoint;
pub mod error;
pub mod memory;
pub mod shipper;
pub mod types;

use std::sync::Arc;

use crate::config::{EndpointKind, ShipperConfig};

pub use cloudwatch::CloudWatchEndpoint;
pub use endpoint::RemoteLogEndpoint;
pub use error::{EndpointError, ShipError, SoftFailure};
pub use memory::MemoryEndpoint;
pub use shipper::SequencedLogShipper;
pub use types::{ContinuationToken, EnsureOutcome, LogRecord};

/// Construct the endpoint selected by `config.backend`.
pub fn build_endpoint(config: &ShipperConfig) -> Result<Arc<dyn RemoteLogEndpoint>, EndpointError> {
    match config.backend {
        EndpointKind::CloudWatch => Ok(Arc::new(CloudWatchEndpoint::new(config)?)),
        EndpointKind::Memory => {
            tracing::warn!("Shipping logs to an in-memory stream; records are lost on exit");
            Ok(Arc::new(MemoryEndpoint::new()))
        }
    }
}

/// Construct a shipper over the configured endpoint.
pub fn build_shipper(config: &ShipperConfig) -> Result<SequencedLogShipper, EndpointError> {
    let endpoint = build_endpoint(config)?;
    Ok(SequencedLogShipper::new(endpoint, config.clone()))
}
