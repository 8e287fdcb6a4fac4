//! RPC plumbing consumed by the scenario runner
//!
//! - `status`: status codes and failed call outcomes
//! - `registry`: action name to invoker + comparison bindings
//! - `descriptor`: service/method descriptions a registry is bound from
//! - `schema`: message shapes compiled from a service's `.proto` file
//! - `connect`: invoker for live services speaking Connect/JSON
//! - `grpc`: invoker for live gRPC services

pub mod connect;
pub mod descriptor;
pub mod grpc;
pub mod registry;
pub mod schema;
pub mod status;

pub use descriptor::{MethodDescriptor, ServiceDescriptor};
pub use registry::{FnInvoker, Invoker, MethodBinding, MethodRegistry, TypedMethod};
pub use schema::{MethodShape, ProtoSchema};
pub use status::{Code, Status};
