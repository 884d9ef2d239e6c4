//! In-process log service with strict token matching.
//!
//! Behaves like the remote service for everything the shipper relies on:
//! groups and streams must be created before use, creates are not
//! idempotent, and an append must present the exact token returned by the
//! previous append (none for an empty stream). Used for local development
//! and as the fake in tests, so it also supports fault injection and keeps
//! counters about the calls it has seen.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use crate::shipping::endpoint::RemoteLogEndpoint;
use crate::shipping::error::EndpointError;
use crate::shipping::types::{ContinuationToken, LogRecord};

type StreamKey = (String, String);

#[derive(Debug, Default)]
struct StreamState {
    records: Vec<LogRecord>,
    token: Option<ContinuationToken>,
}

#[derive(Debug, Default)]
struct Faults {
    stale_appends: u32,
    group_create: Option<String>,
    stream_create: Option<String>,
    token_lookup: Option<String>,
    append: Option<String>,
}

/// Tracks overlapping append calls.
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A [`RemoteLogEndpoint`] held entirely in memory.
#[derive(Default)]
pub struct MemoryEndpoint {
    groups: DashSet<String>,
    streams: DashMap<StreamKey, StreamState>,
    faults: Mutex<Faults>,
    sequence: AtomicU64,
    append_latency: Duration,
    group_creates: AtomicUsize,
    stream_creates: AtomicUsize,
    append_calls: AtomicUsize,
    appends_in_flight: AtomicUsize,
    peak_appends_in_flight: AtomicUsize,
    presented: Mutex<Vec<Option<ContinuationToken>>>,
}

impl MemoryEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every append, before the token check.
    pub fn with_append_latency(mut self, latency: Duration) -> Self {
        self.append_latency = latency;
        self
    }

    /// Reject the next `count` appends as stale regardless of the token.
    pub fn inject_stale(&self, count: u32) {
        self.faults().stale_appends = count;
    }

    pub fn fail_group_create(&self, reason: impl Into<String>) {
        self.faults().group_create = Some(reason.into());
    }

    pub fn fail_stream_create(&self, reason: impl Into<String>) {
        self.faults().stream_create = Some(reason.into());
    }

    pub fn fail_token_lookup(&self, reason: impl Into<String>) {
        self.faults().token_lookup = Some(reason.into());
    }

    pub fn fail_appends(&self, reason: impl Into<String>) {
        self.faults().append = Some(reason.into());
    }

    /// Drop every injected fault.
    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    /// Remove a stream and everything in it.
    pub fn delete_stream(&self, group: &str, stream: &str) -> bool {
        self.streams
            .remove(&(group.to_string(), stream.to_string()))
            .is_some()
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn has_stream(&self, group: &str, stream: &str) -> bool {
        self.streams
            .contains_key(&(group.to_string(), stream.to_string()))
    }

    /// Records of a stream in append order.
    pub fn records(&self, group: &str, stream: &str) -> Vec<LogRecord> {
        self.streams
            .get(&(group.to_string(), stream.to_string()))
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    /// Messages of a stream in append order.
    pub fn messages(&self, group: &str, stream: &str) -> Vec<String> {
        self.records(group, stream)
            .into_iter()
            .map(|r| r.message)
            .collect()
    }

    /// The token the next append to this stream must present.
    pub fn head_token(&self, group: &str, stream: &str) -> Option<ContinuationToken> {
        self.streams
            .get(&(group.to_string(), stream.to_string()))
            .and_then(|s| s.token.clone())
    }

    pub fn group_create_calls(&self) -> usize {
        self.group_creates.load(Ordering::SeqCst)
    }

    pub fn stream_create_calls(&self) -> usize {
        self.stream_creates.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Highest number of append calls observed running at once.
    pub fn peak_concurrent_appends(&self) -> usize {
        self.peak_appends_in_flight.load(Ordering::SeqCst)
    }

    /// Tokens presented to `append`, in call order.
    pub fn presented_tokens(&self) -> Vec<Option<ContinuationToken>> {
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_token(&self) -> ContinuationToken {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        ContinuationToken::new(format!("{:056}", seq))
    }
}

#[async_trait]
impl RemoteLogEndpoint for MemoryEndpoint {
    async fn create_group(&self, group: &str) -> Result<(), EndpointError> {
        self.group_creates.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.faults().group_create {
            return Err(EndpointError::Transport(reason.clone()));
        }

        if self.groups.insert(group.to_string()) {
            Ok(())
        } else {
            Err(EndpointError::AlreadyExists(format!("log group {}", group)))
        }
    }

    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), EndpointError> {
        self.stream_creates.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.faults().stream_create {
            return Err(EndpointError::Transport(reason.clone()));
        }

        if !self.groups.contains(group) {
            return Err(EndpointError::NotFound(format!("log group {}", group)));
        }

        match self.streams.entry((group.to_string(), stream.to_string())) {
            Entry::Occupied(_) => Err(EndpointError::AlreadyExists(format!(
                "log stream {}/{}",
                group, stream
            ))),
            Entry::Vacant(slot) => {
                slot.insert(StreamState::default());
                Ok(())
            }
        }
    }

    async fn current_token(
        &self,
        group: &str,
        stream_prefix: &str,
    ) -> Result<Option<ContinuationToken>, EndpointError> {
        if let Some(reason) = &self.faults().token_lookup {
            return Err(EndpointError::Transport(reason.clone()));
        }

        if !self.groups.contains(group) {
            return Err(EndpointError::NotFound(format!("log group {}", group)));
        }

        let mut matches: Vec<(String, Option<ContinuationToken>)> = self
            .streams
            .iter()
            .filter(|entry| entry.key().0 == group && entry.key().1.starts_with(stream_prefix))
            .map(|entry| (entry.key().1.clone(), entry.value().token.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(matches.into_iter().next().and_then(|(_, token)| token))
    }

    async fn append(
        &self,
        group: &str,
        stream: &str,
        records: &[LogRecord],
        token: Option<&ContinuationToken>,
    ) -> Result<Option<ContinuationToken>, EndpointError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.appends_in_flight, &self.peak_appends_in_flight);

        if !self.append_latency.is_zero() {
            tokio::time::sleep(self.append_latency).await;
        }

        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(token.cloned());

        {
            let mut faults = self.faults();
            if let Some(reason) = &faults.append {
                return Err(EndpointError::Service {
                    code: "ServiceUnavailableException".to_string(),
                    message: reason.clone(),
                });
            }
            if faults.stale_appends > 0 {
                faults.stale_appends -= 1;
                return Err(EndpointError::StaleToken);
            }
        }

        let key = (group.to_string(), stream.to_string());
        let mut state = self
            .streams
            .get_mut(&key)
            .ok_or_else(|| EndpointError::NotFound(format!("log stream {}/{}", group, stream)))?;

        if state.token.as_ref() != token {
            return Err(EndpointError::StaleToken);
        }

        state.records.extend_from_slice(records);
        let next = self.next_token();
        state.token = Some(next.clone());

        Ok(Some(next))
    }
}
