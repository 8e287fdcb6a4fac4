//! stest - data-driven RPC scenario testing
//!
//! A scenario is a JSON or YAML array of test cases. Each case names an RPC
//! action, a request, and either an expected response (optionally retried
//! with pacing) or an expected status code. The runner executes the cases
//! against a registry of bound methods and reports a verdict per case.

pub mod cli;
pub mod commands;
pub mod common;
pub mod rpc;
pub mod testing;

// Re-export commonly used types for hosts and tests
pub use common::{Error, Result};
pub use rpc::{Code, Invoker, MethodRegistry, Status, TypedMethod};
pub use testing::{CaseOutcome, CaseVerdict, Comparison, ScenarioDocument, TestCase};
