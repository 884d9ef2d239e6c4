//! Response observation middleware.
//!
//! Records request metrics and hands every response at or above the
//! configured status threshold to the log shipper. Shipping runs on its own
//! task so the client never waits for the remote log service. The number of
//! reports in flight is capped; past the cap, reports are dropped.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::ReportingConfig;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::shipping::SequencedLogShipper;

/// Log line shipped for an error response.
pub fn error_line(status: StatusCode, path: &str, method: &Method) -> String {
    format!(
        "Error {} - Route: {} - Method: {}",
        status.as_u16(),
        path,
        method
    )
}

/// Route label for requests no explicit route matched.
pub const FALLBACK_ROUTE: &str = "fallback";

/// Sends error responses to the remote log stream.
#[derive(Clone)]
pub struct ErrorReporter {
    shipper: Arc<SequencedLogShipper>,
    threshold: u16,
    in_flight: Arc<Semaphore>,
}

impl ErrorReporter {
    pub fn new(shipper: Arc<SequencedLogShipper>, config: &ReportingConfig) -> Self {
        Self {
            shipper,
            threshold: config.error_status_threshold,
            in_flight: Arc::new(Semaphore::new(config.max_in_flight)),
        }
    }

    pub fn should_report(&self, status: StatusCode) -> bool {
        status.as_u16() >= self.threshold
    }

    /// Ship a line for `status` if it qualifies and a slot is free.
    /// The returned task never fails.
    pub fn report(
        &self,
        status: StatusCode,
        method: &Method,
        path: &str,
        request_id: &str,
    ) -> Option<JoinHandle<()>> {
        if !self.should_report(status) {
            return None;
        }

        let permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    "Too many error reports in flight, dropping"
                );
                metrics::record_submission("dropped");
                return None;
            }
        };

        let line = error_line(status, path, method);
        let shipper = self.shipper.clone();
        let request_id = request_id.to_string();
        Some(tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = shipper.submit(line).await {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Error report was not delivered"
                );
            }
        }))
    }
}

/// Metrics label for the request's route: the matched pattern, never the raw path.
pub fn route_label<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| FALLBACK_ROUTE.to_string())
}

/// Keeps `active_connections` balanced even if the request future is dropped.
struct ActiveRequest;

impl ActiveRequest {
    fn begin() -> Self {
        metrics::connection_opened();
        Self
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        metrics::connection_closed();
    }
}

pub async fn observe_response(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);
    let request_id = request_id(request.headers()).to_string();

    let active = ActiveRequest::begin();
    let response = next.run(request).await;
    drop(active);

    let status = response.status();
    metrics::record_request(method.as_str(), &route, status.as_u16(), start);

    if let Some(reporter) = &state.reporter {
        if reporter.report(status, &method, &path, &request_id).is_some() {
            tracing::debug!(
                request_id = %request_id,
                status = status.as_u16(),
                path = %path,
                "Error response reported"
            );
        }
    }

    response
}
