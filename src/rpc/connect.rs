//! Connect/JSON method binding
//!
//! Calls unary methods of a live service using the Connect protocol with
//! JSON payloads:
//! ```text
//! POST {base_url}/{package}.{Service}/{Method}
//! Content-Type: application/json
//! Connect-Protocol-Version: 1
//!
//! <request JSON>
//! ```
//! A 200 response carries the response message; anything else carries an
//! error body `{"code": "<name>", "message": "..."}`.
//!
//! With a `MethodShape` the invoker decodes payloads through the method's
//! proto messages; without one they pass through untouched.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::registry::Invoker;
use super::schema::MethodShape;
use super::status::{Code, Status};
use crate::common::{Error, Result};

const PROTOCOL_VERSION_HEADER: &str = "Connect-Protocol-Version";
const TIMEOUT_HEADER: &str = "Connect-Timeout-Ms";

/// Build an HTTP client shared by all methods of a target
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))
}

/// One method of a service reachable over Connect/JSON
pub struct ConnectInvoker {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    shape: Option<MethodShape>,
}

impl ConnectInvoker {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        service: &str,
        method: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: method_url(base_url, service, method),
            timeout,
            shape: None,
        }
    }

    /// Decode requests and responses through the method's message types
    pub fn with_shape(mut self, shape: MethodShape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Invoker for ConnectInvoker {
    fn decode_request(&self, request: &Value) -> std::result::Result<Value, String> {
        match &self.shape {
            Some(shape) => shape.decode_request(request),
            None => Ok(request.clone()),
        }
    }

    fn decode_response(&self, response: &Value) -> std::result::Result<Value, String> {
        match &self.shape {
            Some(shape) => shape.decode_response(response),
            None => Ok(response.clone()),
        }
    }

    async fn invoke(&self, request: &Value) -> std::result::Result<Value, Status> {
        tracing::trace!(url = %self.url, "Connect call");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(PROTOCOL_VERSION_HEADER, "1")
            .header(TIMEOUT_HEADER, self.timeout.as_millis().to_string())
            .json(request)
            .send()
            .await
            .map_err(status_from_transport)?;

        let http_status = response.status();
        let body = response.bytes().await.map_err(status_from_transport)?;

        if http_status.is_success() {
            if body.is_empty() {
                return Ok(Value::Object(Default::default()));
            }
            serde_json::from_slice(&body)
                .map_err(|e| Status::internal(format!("invalid response body: {}", e)))
        } else {
            Err(status_from_error_body(http_status.as_u16(), &body))
        }
    }
}

/// URL of a method: `{base}/{service}/{method}`
pub fn method_url(base_url: &str, service: &str, method: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), service, method)
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Status carried by a non-200 Connect response
pub fn status_from_error_body(http_status: u16, body: &[u8]) -> Status {
    let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();

    let code = parsed
        .as_ref()
        .and_then(|b| b.code.as_deref())
        .and_then(Code::from_name)
        .unwrap_or_else(|| code_from_http(http_status));

    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| format!("HTTP {}", http_status));

    Status::new(code, message)
}

/// Fallback mapping from HTTP status when the body names no code
pub fn code_from_http(http_status: u16) -> Code {
    match http_status {
        400 => Code::Internal,
        401 => Code::Unauthenticated,
        403 => Code::PermissionDenied,
        404 => Code::Unimplemented,
        408 => Code::DeadlineExceeded,
        429 | 502 | 503 | 504 => Code::Unavailable,
        _ => Code::Unknown,
    }
}

fn status_from_transport(e: reqwest::Error) -> Status {
    if e.is_timeout() {
        Status::new(Code::DeadlineExceeded, e.to_string())
    } else if e.is_connect() {
        Status::unavailable(e.to_string())
    } else {
        Status::new(Code::Unknown, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::descriptor::ServiceDescriptor;
    use crate::rpc::schema::ProtoSchema;
    use serde_json::json;
    use std::path::PathBuf;

    fn invoker(method: &str) -> ConnectInvoker {
        ConnectInvoker::new(
            reqwest::Client::new(),
            "http://127.0.0.1:13009",
            "pb.Sample",
            method,
            Duration::from_secs(1),
        )
    }

    fn shaped(method: &str) -> ConnectInvoker {
        let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("sample_service.toml");
        let service = ServiceDescriptor::load_path(&manifest).unwrap();
        let schema = ProtoSchema::compile(service.proto.as_deref().unwrap()).unwrap();
        let shape = schema.shapes(&service).unwrap().remove(method).unwrap();
        invoker(method).with_shape(shape)
    }

    #[test]
    fn test_shaped_invoker_checks_payloads() {
        let poll = shaped("Poll");
        assert_eq!(poll.decode_response(&json!({})).unwrap(), json!({"ready": false}));
        assert!(poll.decode_response(&json!({"ready": 5})).is_err());

        let hello = shaped("Hello");
        assert!(hello.decode_request(&json!({"reqMsg": 5})).is_err());
        assert_eq!(
            hello.decode_request(&json!({})).unwrap(),
            json!({"reqMsg": ""})
        );
    }

    #[test]
    fn test_unshaped_invoker_passes_payloads_through() {
        let poll = invoker("Poll");
        assert_eq!(poll.decode_response(&json!({"ready": 5})).unwrap(), json!({"ready": 5}));
        assert_eq!(poll.url(), "http://127.0.0.1:13009/pb.Sample/Poll");
    }

    #[test]
    fn test_method_url() {
        assert_eq!(
            method_url("http://localhost:13009/", "pb.Sample", "Hello"),
            "http://localhost:13009/pb.Sample/Hello"
        );
        assert_eq!(
            method_url("http://localhost:13009", "pb.Sample", "Bye"),
            "http://localhost:13009/pb.Sample/Bye"
        );
    }

    #[test]
    fn test_error_body_code_wins() {
        let status = status_from_error_body(
            400,
            br#"{"code": "invalid_argument", "message": "invalid argument"}"#,
        );
        assert_eq!(status.code, Code::InvalidArgument);
        assert_eq!(status.message, "invalid argument");
    }

    #[test]
    fn test_http_fallback_without_body() {
        let status = status_from_error_body(503, b"");
        assert_eq!(status.code, Code::Unavailable);
        assert_eq!(status.message, "HTTP 503");

        assert_eq!(status_from_error_body(404, b"not json").code, Code::Unimplemented);
        assert_eq!(
            status_from_error_body(500, br#"{"code": "bogus"}"#).code,
            Code::Unknown
        );
    }

    #[test]
    fn test_code_from_http() {
        assert_eq!(code_from_http(400), Code::Internal);
        assert_eq!(code_from_http(401), Code::Unauthenticated);
        assert_eq!(code_from_http(403), Code::PermissionDenied);
        assert_eq!(code_from_http(429), Code::Unavailable);
        assert_eq!(code_from_http(418), Code::Unknown);
    }
}
