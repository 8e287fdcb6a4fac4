//! Message shapes from proto schemas
//!
//! The `.proto` file named by a service manifest is compiled in process and
//! each method's input and output message descriptors are looked up. A
//! `MethodShape` brings payloads into canonical proto JSON: field names in
//! their JSON form, every default spelled out, wrongly typed fields
//! rejected. Expected and actual responses decoded this way compare equal
//! when they denote the same message, even if a server omits defaults.

use prost::Message;
use prost_reflect::{
    DescriptorPool, DeserializeOptions, DynamicMessage, MessageDescriptor, SerializeOptions,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use super::descriptor::{MethodDescriptor, ServiceDescriptor};
use crate::common::{Error, Result};

/// A compiled proto file and its imports
pub struct ProtoSchema {
    pool: DescriptorPool,
}

impl ProtoSchema {
    /// Compile a proto file; imports are resolved from its directory
    pub fn compile(path: &Path) -> Result<Self> {
        let file = path
            .file_name()
            .ok_or_else(|| Error::ProtoSchema(format!("'{}' is not a file", path.display())))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let files = protox::compile([file], [dir]).map_err(|e| {
            Error::ProtoSchema(format!("Failed to compile '{}': {}", path.display(), e))
        })?;
        let pool = DescriptorPool::decode(files.encode_to_vec().as_ref()).map_err(|e| {
            Error::ProtoSchema(format!(
                "Failed to load descriptors of '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self { pool })
    }

    /// Shape of one manifest method, checked against the schema
    pub fn method(&self, service: &ServiceDescriptor, method: &MethodDescriptor) -> Result<MethodShape> {
        let full_name = service.full_name();
        let proto_service = self.pool.get_service_by_name(&full_name).ok_or_else(|| {
            Error::ProtoSchema(format!("service '{}' is not declared", full_name))
        })?;
        let proto_method = proto_service
            .methods()
            .find(|m| m.name() == method.name)
            .ok_or_else(|| {
                Error::ProtoSchema(format!(
                    "method '{}' is not declared by '{}'",
                    method.name, full_name
                ))
            })?;

        if proto_method.is_client_streaming() || proto_method.is_server_streaming() {
            return Err(Error::ProtoSchema(format!(
                "method '{}' is streaming; only unary methods can be tested",
                method.name
            )));
        }

        let input = proto_method.input();
        let output = proto_method.output();
        check_type(&method.name, "request", &method.request_type, &input)?;
        check_type(&method.name, "response", &method.response_type, &output)?;

        Ok(MethodShape { input, output })
    }

    /// Shapes of every method in the manifest, keyed by method name
    pub fn shapes(&self, service: &ServiceDescriptor) -> Result<HashMap<String, MethodShape>> {
        service
            .methods
            .iter()
            .map(|method| -> Result<(String, MethodShape)> {
                Ok((method.name.clone(), self.method(service, method)?))
            })
            .collect()
    }
}

/// The manifest may name a message either plainly or fully qualified
fn check_type(method: &str, role: &str, declared: &str, actual: &MessageDescriptor) -> Result<()> {
    if declared == actual.name() || declared == actual.full_name() {
        Ok(())
    } else {
        Err(Error::ProtoSchema(format!(
            "method '{}' declares {} type '{}' but the schema has '{}'",
            method,
            role,
            declared,
            actual.full_name()
        )))
    }
}

/// Request and response message types of one method
#[derive(Debug, Clone)]
pub struct MethodShape {
    pub input: MessageDescriptor,
    pub output: MessageDescriptor,
}

impl MethodShape {
    pub fn decode_request(&self, request: &Value) -> std::result::Result<Value, String> {
        canonical(&self.input, request)
    }

    pub fn decode_response(&self, response: &Value) -> std::result::Result<Value, String> {
        canonical(&self.output, response)
    }
}

/// Build a message from proto JSON; unknown fields are ignored
pub fn to_message(
    shape: &MessageDescriptor,
    value: &Value,
) -> std::result::Result<DynamicMessage, String> {
    let options = DeserializeOptions::new().deny_unknown_fields(false);
    DynamicMessage::deserialize_with_options(shape.clone(), value.clone(), &options)
        .map_err(|e| e.to_string())
}

/// Proto JSON of a message with every default field present
pub fn to_json(message: &DynamicMessage) -> std::result::Result<Value, String> {
    let options = SerializeOptions::new().skip_default_fields(false);
    message
        .serialize_with_options(serde_json::value::Serializer, &options)
        .map_err(|e| e.to_string())
}

fn canonical(shape: &MessageDescriptor, value: &Value) -> std::result::Result<Value, String> {
    to_json(&to_message(shape, value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn sample() -> (ProtoSchema, ServiceDescriptor) {
        let service = ServiceDescriptor::load_path(&fixture("sample_service.toml")).unwrap();
        let schema = ProtoSchema::compile(service.proto.as_deref().unwrap()).unwrap();
        (schema, service)
    }

    fn shape_of(action: &str) -> MethodShape {
        let (schema, service) = sample();
        schema.shapes(&service).unwrap().remove(action).unwrap()
    }

    #[test]
    fn test_shapes_cover_every_method() {
        let (schema, service) = sample();
        let shapes = schema.shapes(&service).unwrap();

        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes["Hello"].input.full_name(), "pb.HelloRequest");
        assert_eq!(shapes["Poll"].output.full_name(), "pb.PollResponse");
    }

    #[test]
    fn test_defaults_are_filled_in() {
        let poll = shape_of("Poll");
        assert_eq!(poll.decode_response(&json!({})).unwrap(), json!({"ready": false}));
        assert_eq!(
            poll.decode_response(&json!({"ready": false})).unwrap(),
            poll.decode_response(&json!({})).unwrap()
        );
    }

    #[test]
    fn test_field_names_are_canonical() {
        let hello = shape_of("Hello");
        assert_eq!(
            hello.decode_request(&json!({"req_msg": "hi"})).unwrap(),
            json!({"reqMsg": "hi"})
        );
        assert_eq!(
            hello.decode_response(&json!({"resMsg": "Hello!", "extra": 1})).unwrap(),
            json!({"resMsg": "Hello!"})
        );
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        assert!(shape_of("Poll").decode_response(&json!({"ready": 5})).is_err());
        assert!(shape_of("Hello").decode_request(&json!({"reqMsg": ["a"]})).is_err());
        assert!(shape_of("Hello").decode_request(&json!("hello")).is_err());
    }

    #[test]
    fn test_manifest_must_match_schema() {
        let (schema, mut service) = sample();
        service.methods[0].request_type = "pb.HelloRequest".to_string();
        assert!(schema.method(&service, &service.methods[0]).is_ok());

        service.methods[0].request_type = "ByeRequest".to_string();
        let err = schema.method(&service, &service.methods[0]).unwrap_err();
        assert!(err.to_string().contains("pb.HelloRequest"), "got: {}", err);

        service.methods[0].request_type = "HelloRequest".to_string();
        service.methods[0].name = "Wave".to_string();
        assert!(matches!(
            schema.method(&service, &service.methods[0]),
            Err(Error::ProtoSchema(_))
        ));

        service.service = "Other".to_string();
        assert!(schema.shapes(&service).is_err());
    }

    #[test]
    fn test_streaming_methods_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let proto = dir.path().join("stream.proto");
        std::fs::write(
            &proto,
            r#"
            syntax = "proto3";
            package pb;
            service Feed {
              rpc Watch(Ping) returns (stream Ping);
            }
            message Ping {}
            "#,
        )
        .unwrap();

        let schema = ProtoSchema::compile(&proto).unwrap();
        let service = ServiceDescriptor::parse(
            r#"
            package = "pb"
            service = "Feed"

            [[methods]]
            name = "Watch"
            request_type = "Ping"
            response_type = "Ping"
            "#,
        )
        .unwrap();
        let err = schema.method(&service, &service.methods[0]).unwrap_err();
        assert!(err.to_string().contains("streaming"));
    }

    #[test]
    fn test_invalid_proto_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let proto = dir.path().join("broken.proto");
        std::fs::write(&proto, "syntax = \"proto3\";\nmessage {").unwrap();

        assert!(matches!(
            ProtoSchema::compile(&proto),
            Err(Error::ProtoSchema(_))
        ));
        assert!(ProtoSchema::compile(&dir.path().join("missing.proto")).is_err());
    }
}
