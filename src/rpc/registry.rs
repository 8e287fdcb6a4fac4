//! Method registry
//!
//! Maps action names to the capability that performs the call and the
//! comparison strategy that judges its response. The registry is built once
//! before a run and only read afterwards, so it can be shared across
//! concurrent runs behind an `Arc`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::descriptor::{MethodDescriptor, ServiceDescriptor};
use super::status::Status;
use crate::common::{Error, Result};
use crate::testing::compare::Comparison;

/// A bound RPC method
///
/// `decode_request` and `decode_response` bring scenario payloads into the
/// method's message shapes; the defaults accept any structured value as is.
#[async_trait]
pub trait Invoker: Send + Sync {
    fn decode_request(&self, request: &Value) -> std::result::Result<Value, String> {
        Ok(request.clone())
    }

    fn decode_response(&self, response: &Value) -> std::result::Result<Value, String> {
        Ok(response.clone())
    }

    /// Perform one call
    async fn invoke(&self, request: &Value) -> std::result::Result<Value, Status>;
}

/// Invoker backed by a plain synchronous function over structured values
pub struct FnInvoker<F>(pub F);

#[async_trait]
impl<F> Invoker for FnInvoker<F>
where
    F: Fn(&Value) -> std::result::Result<Value, Status> + Send + Sync,
{
    async fn invoke(&self, request: &Value) -> std::result::Result<Value, Status> {
        (self.0)(request)
    }
}

/// Invoker over typed request/response messages
///
/// Payloads are decoded through the serde shapes, so missing fields take
/// their defaults and wrongly typed ones are rejected before any call.
pub struct TypedMethod<Req, Res, F> {
    call: F,
    _shapes: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res, F, Fut> TypedMethod<Req, Res, F>
where
    F: Fn(Req) -> Fut,
    Fut: Future<Output = std::result::Result<Res, Status>>,
{
    pub fn new(call: F) -> Self {
        Self {
            call,
            _shapes: PhantomData,
        }
    }
}

fn reshape<T: DeserializeOwned + Serialize>(value: &Value) -> std::result::Result<Value, String> {
    let typed: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    serde_json::to_value(typed).map_err(|e| e.to_string())
}

#[async_trait]
impl<Req, Res, F, Fut> Invoker for TypedMethod<Req, Res, F>
where
    Req: DeserializeOwned + Serialize + Send + 'static,
    Res: DeserializeOwned + Serialize + Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Res, Status>> + Send + 'static,
{
    fn decode_request(&self, request: &Value) -> std::result::Result<Value, String> {
        reshape::<Req>(request)
    }

    fn decode_response(&self, response: &Value) -> std::result::Result<Value, String> {
        reshape::<Res>(response)
    }

    async fn invoke(&self, request: &Value) -> std::result::Result<Value, Status> {
        let request: Req = serde_json::from_value(request.clone())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let response = (self.call)(request).await?;
        serde_json::to_value(response).map_err(|e| Status::internal(e.to_string()))
    }
}

/// Invoker and comparison strategy for one action
#[derive(Clone)]
pub struct MethodBinding {
    pub invoker: Arc<dyn Invoker>,
    pub comparison: Comparison,
}

/// Read-only mapping from action name to method binding
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, MethodBinding>,
}

impl MethodRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Bind every method of a validated service descriptor
    ///
    /// Each method gets the comparison named in its descriptor, or structural
    /// equality when none is given. The first binding error aborts the build.
    pub fn from_descriptor<F>(descriptor: &ServiceDescriptor, mut bind: F) -> Result<Self>
    where
        F: FnMut(&MethodDescriptor) -> Result<Arc<dyn Invoker>>,
    {
        descriptor.validate()?;

        let mut builder = Self::builder();
        for method in &descriptor.methods {
            builder = builder.bind(&method.name, bind(method)?, method.comparison());
        }
        builder.build()
    }

    pub fn get(&self, action: &str) -> Option<&MethodBinding> {
        self.methods.get(action)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.methods.contains_key(action)
    }

    /// Registered action names, sorted
    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Builder for `MethodRegistry`
#[derive(Default)]
pub struct RegistryBuilder {
    methods: HashMap<String, MethodBinding>,
    overrides: Vec<(String, Comparison)>,
    errors: Vec<String>,
}

impl RegistryBuilder {
    /// Register an action compared by structural equality
    pub fn method(self, action: &str, invoker: impl Invoker + 'static) -> Self {
        self.bind(action, Arc::new(invoker), Comparison::Structural)
    }

    /// Register an action with an explicit comparison strategy
    pub fn method_with(
        self,
        action: &str,
        invoker: impl Invoker + 'static,
        comparison: Comparison,
    ) -> Self {
        self.bind(action, Arc::new(invoker), comparison)
    }

    /// Replace the comparison strategy of an action registered on this builder
    pub fn comparator(mut self, action: &str, comparison: Comparison) -> Self {
        self.overrides.push((action.to_string(), comparison));
        self
    }

    pub fn bind(mut self, action: &str, invoker: Arc<dyn Invoker>, comparison: Comparison) -> Self {
        if action.trim().is_empty() {
            self.errors.push("action names must not be empty".to_string());
        } else if self.methods.contains_key(action) {
            self.errors
                .push(format!("action '{}' is registered twice", action));
        } else {
            self.methods.insert(
                action.to_string(),
                MethodBinding {
                    invoker,
                    comparison,
                },
            );
        }
        self
    }

    pub fn build(mut self) -> Result<MethodRegistry> {
        for (action, comparison) in std::mem::take(&mut self.overrides) {
            match self.methods.get_mut(&action) {
                Some(binding) => binding.comparison = comparison,
                None => self.errors.push(format!(
                    "comparator given for unregistered action '{}'",
                    action
                )),
            }
        }

        if !self.errors.is_empty() {
            return Err(Error::InvalidDescriptor(self.errors.join("; ")));
        }

        Ok(MethodRegistry {
            methods: self.methods,
        })
    }
}
