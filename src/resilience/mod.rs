//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the remote log service:
//!     → timeouts.rs (enforce the per-call deadline)
//!     → On stale token: bounded retry loop in the shipper
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timeout is an endpoint error like any other, classified by the caller

pub mod timeouts;

pub use timeouts::with_deadline;
