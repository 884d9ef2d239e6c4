//! CloudWatch Logs client over the JSON 1.1 protocol.
//!
//! # Responsibilities
//! - Issue CreateLogGroup, CreateLogStream, DescribeLogStreams, PutLogEvents
//! - Classify service error codes into [`EndpointError`] variants
//!
//! # Design Decisions
//! - Request signing is not done here; credentials arrive as configured headers
//! - One POST per call, action selected by the `X-Amz-Target` header
//! - Error type names may carry a `namespace#` prefix, which is ignored

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ShipperConfig;
use crate::shipping::endpoint::RemoteLogEndpoint;
use crate::shipping::error::EndpointError;
use crate::shipping::types::{ContinuationToken, LogRecord};

/// Header selecting the API action.
pub const X_AMZ_TARGET: &str = "x-amz-target";
/// Content type of every request and response body.
pub const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "Logs_20140328";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name_prefix: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DescribeLogStreamsResponse {
    #[serde(default)]
    log_streams: Vec<LogStreamDescription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStreamDescription {
    upload_sequence_token: Option<ContinuationToken>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputLogEvent<'a> {
    timestamp: i64,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: Vec<InputLogEvent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a ContinuationToken>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<ContinuationToken>,
}

/// Error body returned with a non-success status.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(default, alias = "Message")]
    message: String,
    expected_sequence_token: Option<ContinuationToken>,
}

/// Map a service error body onto the endpoint error taxonomy.
fn classify(status: reqwest::StatusCode, body: ServiceErrorBody) -> EndpointError {
    let code = body
        .error_type
        .rsplit('#')
        .next()
        .unwrap_or_default()
        .to_string();

    match code.as_str() {
        "ResourceAlreadyExistsException" => EndpointError::AlreadyExists(body.message),
        "ResourceNotFoundException" => EndpointError::NotFound(body.message),
        "InvalidSequenceTokenException" => EndpointError::StaleToken,
        "DataAlreadyAcceptedException" => EndpointError::AlreadyAccepted {
            next: body.expected_sequence_token,
        },
        "" => EndpointError::Service {
            code: status.to_string(),
            message: body.message,
        },
        _ => EndpointError::Service {
            code,
            message: body.message,
        },
    }
}

/// A [`RemoteLogEndpoint`] backed by the CloudWatch Logs HTTP API.
pub struct CloudWatchEndpoint {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
}

impl CloudWatchEndpoint {
    /// Build a client for the configured region or endpoint URL.
    pub fn new(config: &ShipperConfig) -> Result<Self, EndpointError> {
        let url = Url::parse(&config.resolved_endpoint_url())
            .map_err(|e| EndpointError::InvalidRequest(format!("endpoint URL: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| EndpointError::InvalidRequest(format!("header '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| EndpointError::InvalidRequest(format!("header '{}': {}", name.as_str(), e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        if !config.has_authorization() {
            tracing::warn!(
                url = %url,
                "No authorization header configured, requests will be unauthenticated"
            );
        }
        tracing::info!(url = %url, region = %config.region, "CloudWatch endpoint configured");

        Ok(Self {
            client,
            url,
            headers,
        })
    }

    async fn call<Req, Resp>(&self, action: &str, request: &Req) -> Result<Resp, EndpointError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Default,
    {
        let target = format!("{}.{}", TARGET_PREFIX, action);
        let response = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .header(X_AMZ_TARGET, target)
            .json(request)
            .send()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        if !status.is_success() {
            let error: ServiceErrorBody = serde_json::from_str(&body).unwrap_or_else(|_| {
                ServiceErrorBody {
                    message: body.clone(),
                    ..ServiceErrorBody::default()
                }
            });
            return Err(classify(status, error));
        }

        if body.trim().is_empty() {
            return Ok(Resp::default());
        }
        serde_json::from_str(&body).map_err(|e| EndpointError::Malformed(format!("{}: {}", action, e)))
    }
}

#[async_trait]
impl RemoteLogEndpoint for CloudWatchEndpoint {
    async fn create_group(&self, group: &str) -> Result<(), EndpointError> {
        let _: serde_json::Value = self
            .call("CreateLogGroup", &CreateLogGroupRequest { log_group_name: group })
            .await?;
        Ok(())
    }

    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), EndpointError> {
        let _: serde_json::Value = self
            .call(
                "CreateLogStream",
                &CreateLogStreamRequest {
                    log_group_name: group,
                    log_stream_name: stream,
                },
            )
            .await?;
        Ok(())
    }

    async fn current_token(
        &self,
        group: &str,
        stream_prefix: &str,
    ) -> Result<Option<ContinuationToken>, EndpointError> {
        let response: DescribeLogStreamsResponse = self
            .call(
                "DescribeLogStreams",
                &DescribeLogStreamsRequest {
                    log_group_name: group,
                    log_stream_name_prefix: stream_prefix,
                },
            )
            .await?;

        Ok(response
            .log_streams
            .into_iter()
            .next()
            .and_then(|s| s.upload_sequence_token))
    }

    async fn append(
        &self,
        group: &str,
        stream: &str,
        records: &[LogRecord],
        token: Option<&ContinuationToken>,
    ) -> Result<Option<ContinuationToken>, EndpointError> {
        let request = PutLogEventsRequest {
            log_group_name: group,
            log_stream_name: stream,
            log_events: records
                .iter()
                .map(|r| InputLogEvent {
                    timestamp: r.timestamp_millis(),
                    message: &r.message,
                })
                .collect(),
            sequence_token: token,
        };

        let response: PutLogEventsResponse = self.call("PutLogEvents", &request).await?;
        Ok(response.next_sequence_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn error(body: &str) -> EndpointError {
        classify(StatusCode::BAD_REQUEST, serde_json::from_str(body).unwrap())
    }

    #[test]
    fn test_classify_known_codes() {
        assert!(matches!(
            error(r#"{"__type":"ResourceAlreadyExistsException","message":"exists"}"#),
            EndpointError::AlreadyExists(m) if m == "exists"
        ));
        assert!(matches!(
            error(r#"{"__type":"com.amazonaws.logs#ResourceNotFoundException","message":"gone"}"#),
            EndpointError::NotFound(_)
        ));
        assert_eq!(
            error(r#"{"__type":"InvalidSequenceTokenException","expectedSequenceToken":"42"}"#),
            EndpointError::StaleToken
        );
        assert_eq!(
            error(r#"{"__type":"DataAlreadyAcceptedException","expectedSequenceToken":"43"}"#),
            EndpointError::AlreadyAccepted {
                next: Some(ContinuationToken::from("43"))
            }
        );
    }

    #[test]
    fn test_classify_unknown_code() {
        assert_eq!(
            error(r#"{"__type":"ThrottlingException","Message":"Rate exceeded"}"#),
            EndpointError::Service {
                code: "ThrottlingException".into(),
                message: "Rate exceeded".into()
            }
        );
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, ServiceErrorBody::default()),
            EndpointError::Service { code, .. } if code.starts_with("502")
        ));
    }

    #[test]
    fn test_put_request_shape() {
        let record = LogRecord::now("boom");
        let token = ContinuationToken::from("7");
        let request = PutLogEventsRequest {
            log_group_name: "g",
            log_stream_name: "s",
            log_events: vec![InputLogEvent {
                timestamp: record.timestamp_millis(),
                message: &record.message,
            }],
            sequence_token: Some(&token),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["logGroupName"], "g");
        assert_eq!(json["logStreamName"], "s");
        assert_eq!(json["logEvents"][0]["message"], "boom");
        assert_eq!(json["sequenceToken"], "7");

        let request = PutLogEventsRequest {
            sequence_token: None,
            ..request
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("sequenceToken").is_none());
    }

    #[test]
    fn test_rejects_invalid_headers() {
        let mut config = ShipperConfig::default();
        config.headers.insert("bad header".into(), "x".into());
        assert!(matches!(
            CloudWatchEndpoint::new(&config),
            Err(EndpointError::InvalidRequest(_))
        ));
    }
}
