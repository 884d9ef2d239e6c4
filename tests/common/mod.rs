//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use log_shipper::shipping::{
    ContinuationToken, EndpointError, LogRecord, MemoryEndpoint, RemoteLogEndpoint,
};

/// A CloudWatch Logs look-alike backed by a [`MemoryEndpoint`].
#[derive(Clone)]
pub struct FakeCloudWatch {
    pub endpoint: Arc<MemoryEndpoint>,
    pub targets: Arc<Mutex<Vec<String>>>,
    pub authorizations: Arc<Mutex<Vec<String>>>,
}

impl FakeCloudWatch {
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<String> {
        self.authorizations.lock().unwrap().clone()
    }
}

/// Start the fake service on an ephemeral port.
pub async fn start_fake_cloudwatch(endpoint: Arc<MemoryEndpoint>) -> (SocketAddr, FakeCloudWatch) {
    let fake = FakeCloudWatch {
        endpoint,
        targets: Arc::new(Mutex::new(Vec::new())),
        authorizations: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/", post(handle))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, fake)
}

async fn handle(State(fake): State<FakeCloudWatch>, headers: HeaderMap, body: String) -> Response {
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    fake.targets.lock().unwrap().push(target.clone());
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        fake.authorizations.lock().unwrap().push(auth.to_string());
    }

    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let group = request["logGroupName"].as_str().unwrap_or_default();
    let endpoint = &fake.endpoint;

    let result: Result<Option<Value>, EndpointError> =
        match target.strip_prefix("Logs_20140328.").unwrap_or_default() {
            "CreateLogGroup" => endpoint.create_group(group).await.map(|_| None),
            "CreateLogStream" => {
                let stream = request["logStreamName"].as_str().unwrap_or_default();
                endpoint.create_stream(group, stream).await.map(|_| None)
            }
            "DescribeLogStreams" => {
                let prefix = request["logStreamNamePrefix"].as_str().unwrap_or_default();
                endpoint.current_token(group, prefix).await.map(|token| {
                    Some(json!({
                        "logStreams": [{ "logStreamName": prefix, "uploadSequenceToken": token }]
                    }))
                })
            }
            "PutLogEvents" => {
                let stream = request["logStreamName"].as_str().unwrap_or_default();
                let token = request["sequenceToken"].as_str().map(ContinuationToken::from);
                let records: Vec<LogRecord> = request["logEvents"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .iter()
                    .map(|event| LogRecord {
                        timestamp: UNIX_EPOCH
                            + Duration::from_millis(event["timestamp"].as_u64().unwrap_or_default()),
                        message: event["message"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect();
                endpoint
                    .append(group, stream, &records, token.as_ref())
                    .await
                    .map(|next| Some(json!({ "nextSequenceToken": next })))
            }
            other => Err(EndpointError::Service {
                code: "UnknownOperationException".into(),
                message: format!("unknown operation '{}'", other),
            }),
        };

    match result {
        Ok(Some(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(None) => StatusCode::OK.into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(error: EndpointError) -> Response {
    let message = error.to_string();
    let (status, body) = match error {
        EndpointError::AlreadyExists(_) => (
            StatusCode::BAD_REQUEST,
            json!({ "__type": "ResourceAlreadyExistsException", "message": message }),
        ),
        EndpointError::NotFound(_) => (
            StatusCode::BAD_REQUEST,
            json!({ "__type": "com.amazonaws.logs#ResourceNotFoundException", "message": message }),
        ),
        EndpointError::StaleToken => (
            StatusCode::BAD_REQUEST,
            json!({ "__type": "InvalidSequenceTokenException", "message": message }),
        ),
        EndpointError::AlreadyAccepted { next } => (
            StatusCode::BAD_REQUEST,
            json!({
                "__type": "DataAlreadyAcceptedException",
                "message": message,
                "expectedSequenceToken": next,
            }),
        ),
        EndpointError::Service { code, message } => (
            StatusCode::BAD_REQUEST,
            json!({ "__type": code, "message": message }),
        ),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "__type": "ServiceUnavailableException", "message": message }),
        ),
    };
    (status, Json(body)).into_response()
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
