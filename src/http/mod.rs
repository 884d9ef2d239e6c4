//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, static files)
//!     → request.rs (request ID set and propagated)
//!     → middleware.rs (metrics, error responses reported to the shipper)
//!     → ServeFile / ServeDir
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use middleware::ErrorReporter;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
