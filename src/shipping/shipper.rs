//! Ordered, retrying delivery of log lines to one remote stream.
//!
//! # Sequence per `submit`
//! ```text
//! lock stream state
//!     → ensure group + stream (once, unless configured per message)
//!     → token Unknown? fetch current token (failure = no token)
//!     → append [record] with token
//!         Ok(next)        → cache next, done
//!         StaleToken      → forget token, loop (bounded by max_retries)
//!         other           → hard failure
//! unlock
//! ```
//!
//! The lock spans the whole read-token/append/store-token section, so at
//! most one append per stream is in flight and every append presents the
//! token returned by the previous one.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::validation::MAX_STALE_RETRIES;
use crate::config::ShipperConfig;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::shipping::endpoint::RemoteLogEndpoint;
use crate::shipping::error::{EndpointError, ShipError, SoftFailure};
use crate::shipping::types::{ContinuationToken, EnsureOutcome, LogRecord};

/// What the shipper believes the stream head token to be.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CachedToken {
    /// Must ask the service before the next append.
    Unknown,
    /// `None` means the stream is empty and needs no token.
    Known(Option<ContinuationToken>),
}

#[derive(Debug)]
struct ShipperState {
    token: CachedToken,
    bootstrapped: bool,
}

/// Ships log lines, in submission order, to a single remote stream.
pub struct SequencedLogShipper {
    endpoint: Arc<dyn RemoteLogEndpoint>,
    config: ShipperConfig,
    state: Mutex<ShipperState>,
}

impl SequencedLogShipper {
    /// `config.max_retries` is capped at [`MAX_STALE_RETRIES`].
    pub fn new(endpoint: Arc<dyn RemoteLogEndpoint>, mut config: ShipperConfig) -> Self {
        if config.max_retries > MAX_STALE_RETRIES {
            tracing::warn!(
                requested = config.max_retries,
                max = MAX_STALE_RETRIES,
                "Stale retry limit capped"
            );
            config.max_retries = MAX_STALE_RETRIES;
        }

        Self {
            endpoint,
            config,
            state: Mutex::new(ShipperState {
                token: CachedToken::Unknown,
                bootstrapped: false,
            }),
        }
    }

    pub fn config(&self) -> &ShipperConfig {
        &self.config
    }

    /// The token the next append will present, if one is cached.
    pub async fn cached_token(&self) -> Option<ContinuationToken> {
        match &self.state.lock().await.token {
            CachedToken::Known(token) => token.clone(),
            CachedToken::Unknown => None,
        }
    }

    /// Deliver one message. On error the message was not delivered.
    pub async fn submit(&self, message: impl Into<String>) -> Result<(), ShipError> {
        let record = LogRecord::now(message);
        let mut state = self.state.lock().await;

        self.ensure_destination(&mut state).await;

        let attempts = self.config.max_retries + 1;
        for attempt in 1..=attempts {
            let token = self.resolve_token(&mut state).await;
            let result = with_deadline(
                self.config.timeout(),
                self.endpoint.append(
                    &self.config.group_name,
                    &self.config.stream_name,
                    std::slice::from_ref(&record),
                    token.as_ref(),
                ),
            )
            .await;

            match result {
                Ok(next) => {
                    state.token = CachedToken::Known(next);
                    metrics::record_submission("delivered");
                    return Ok(());
                }
                Err(EndpointError::AlreadyAccepted { next }) => {
                    tracing::debug!(
                        stream = %self.config.stream_name,
                        "Batch already accepted by the service"
                    );
                    state.token = match next {
                        Some(token) => CachedToken::Known(Some(token)),
                        None => CachedToken::Unknown,
                    };
                    metrics::record_submission("delivered");
                    return Ok(());
                }
                Err(EndpointError::StaleToken) => {
                    tracing::warn!(
                        stream = %self.config.stream_name,
                        attempt,
                        max_attempts = attempts,
                        "Continuation token is stale, refetching"
                    );
                    state.token = CachedToken::Unknown;
                    metrics::record_stale_retry();
                }
                Err(err) => {
                    match &err {
                        EndpointError::NotFound(_) => {
                            state.bootstrapped = false;
                            state.token = CachedToken::Unknown;
                        }
                        EndpointError::Timeout(_) => state.token = CachedToken::Unknown,
                        _ => {}
                    }
                    tracing::error!(
                        group = %self.config.group_name,
                        stream = %self.config.stream_name,
                        error = %err,
                        "Failed to append log record"
                    );
                    metrics::record_submission("failed");
                    return Err(ShipError::AppendFailed(err));
                }
            }
        }

        tracing::error!(
            stream = %self.config.stream_name,
            attempts,
            "Giving up on log record, token stayed stale"
        );
        metrics::record_submission("exhausted");
        Err(ShipError::RetryExhausted { attempts })
    }

    /// Create group and stream if needed. Never fails the submission.
    async fn ensure_destination(&self, state: &mut ShipperState) {
        if state.bootstrapped && !self.config.ensure_each_submit {
            return;
        }

        let deadline = self.config.timeout();
        let group = EnsureOutcome::from_result(
            with_deadline(deadline, self.endpoint.create_group(&self.config.group_name)).await,
        );
        self.note_ensure(SoftFailure::GroupCreate, &group);

        let stream = EnsureOutcome::from_result(
            with_deadline(
                deadline,
                self.endpoint
                    .create_stream(&self.config.group_name, &self.config.stream_name),
            )
            .await,
        );
        self.note_ensure(SoftFailure::StreamCreate, &stream);

        state.bootstrapped = !group.is_failed() && !stream.is_failed();
    }

    fn note_ensure(&self, step: SoftFailure, outcome: &EnsureOutcome) {
        match outcome {
            EnsureOutcome::Created => tracing::info!(
                group = %self.config.group_name,
                stream = %self.config.stream_name,
                step = step.as_str(),
                "Created remote log resource"
            ),
            EnsureOutcome::AlreadyExisted => tracing::debug!(
                group = %self.config.group_name,
                stream = %self.config.stream_name,
                step = step.as_str(),
                "Remote log resource already exists"
            ),
            EnsureOutcome::Failed(reason) => {
                tracing::warn!(
                    group = %self.config.group_name,
                    stream = %self.config.stream_name,
                    step = step.as_str(),
                    reason = %reason,
                    "Could not ensure remote log resource, appending anyway"
                );
                metrics::record_soft_failure(step.as_str());
            }
        }
    }

    /// Token for the next append, fetching it when unknown.
    async fn resolve_token(&self, state: &mut ShipperState) -> Option<ContinuationToken> {
        if let CachedToken::Known(token) = &state.token {
            return token.clone();
        }

        let lookup = with_deadline(
            self.config.timeout(),
            self.endpoint
                .current_token(&self.config.group_name, &self.config.stream_name),
        )
        .await;

        match lookup {
            Ok(token) => {
                state.token = CachedToken::Known(token.clone());
                token
            }
            Err(err) => {
                tracing::warn!(
                    stream = %self.config.stream_name,
                    error = %err,
                    "Token lookup failed, appending without a token"
                );
                metrics::record_soft_failure(SoftFailure::TokenFetch.as_str());
                None
            }
        }
    }
}
