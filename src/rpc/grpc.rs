//! gRPC method binding
//!
//! Calls unary methods of a gRPC service. There is no generated code: the
//! request JSON is encoded through the method's input descriptor, sent as
//! raw protobuf bytes, and the reply is decoded through the output
//! descriptor back into proto JSON.

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes};
use http::uri::PathAndQuery;
use prost::Message;
use prost_reflect::DynamicMessage;
use serde_json::Value;
use std::time::Duration;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::transport::{Channel, Endpoint};

use super::registry::Invoker;
use super::schema::{to_json, to_message, MethodShape};
use super::status::{Code, Status};
use crate::common::{Error, Result};

/// Open a channel to a gRPC target; the connection is made on first use
pub fn grpc_channel(base_url: &str, timeout: Duration) -> Result<Channel> {
    let endpoint = Endpoint::from_shared(base_url.to_string()).map_err(|e| {
        Error::Transport(format!("Invalid gRPC endpoint '{}': {}", base_url, e))
    })?;
    Ok(endpoint.timeout(timeout).connect_timeout(timeout).connect_lazy())
}

/// Passes already encoded messages through tonic untouched
struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawEncoder;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

struct RawEncoder;

impl Encoder for RawEncoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> std::result::Result<(), Self::Error> {
        dst.put(item);
        Ok(())
    }
}

struct RawDecoder;

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> std::result::Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}

/// One unary method of a gRPC service
pub struct GrpcInvoker {
    channel: Channel,
    path: String,
    shape: MethodShape,
}

impl GrpcInvoker {
    pub fn new(channel: Channel, service: &str, method: &str, shape: MethodShape) -> Self {
        Self {
            channel,
            path: grpc_path(service, method),
            shape,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Invoker for GrpcInvoker {
    fn decode_request(&self, request: &Value) -> std::result::Result<Value, String> {
        self.shape.decode_request(request)
    }

    fn decode_response(&self, response: &Value) -> std::result::Result<Value, String> {
        self.shape.decode_response(response)
    }

    async fn invoke(&self, request: &Value) -> std::result::Result<Value, Status> {
        tracing::trace!(path = %self.path, "gRPC call");

        let message = to_message(&self.shape.input, request).map_err(Status::invalid_argument)?;
        let path: PathAndQuery = self
            .path
            .parse()
            .map_err(|e| Status::internal(format!("invalid method path '{}': {}", self.path, e)))?;

        let mut client = tonic::client::Grpc::new(self.channel.clone());
        client
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("service not ready: {}", e)))?;

        let response = client
            .unary(
                tonic::Request::new(Bytes::from(message.encode_to_vec())),
                path,
                RawCodec,
            )
            .await
            .map_err(status_from_tonic)?;

        let reply = DynamicMessage::decode(self.shape.output.clone(), response.into_inner())
            .map_err(|e| Status::internal(format!("invalid response message: {}", e)))?;
        to_json(&reply).map_err(Status::internal)
    }
}

/// Path of a method: `/{service}/{method}`
pub fn grpc_path(service: &str, method: &str) -> String {
    format!("/{}/{}", service, method)
}

/// Same numbering on both sides; anything unexpected is `Unknown`
pub fn status_from_tonic(status: tonic::Status) -> Status {
    let code = Code::from_i64(status.code() as i64).unwrap_or(Code::Unknown);
    Status::new(code, status.message())
}
