//! CLI command handling
//!
//! Loads scenarios and service manifests, binds the registry against the
//! target service and prints results. Each command returns the process exit
//! status.

use colored::Colorize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::commands::Commands;
use crate::common::config::{Config, Protocol};
use crate::common::{Error, Result};
use crate::rpc::connect::{self, ConnectInvoker};
use crate::rpc::grpc::{self, GrpcInvoker};
use crate::rpc::{Invoker, MethodRegistry, MethodShape, ProtoSchema, ServiceDescriptor};
use crate::testing::report::{self, RunReport};
use crate::testing::{loader, CaseOutcome, RunSummary, Runner, ScenarioDocument};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<i32> {
    match command {
        Commands::Run {
            scenario,
            service,
            target,
            protocol,
            deadline,
            fail_fast,
            json,
        } => {
            let config = match config_path {
                Some(path) => Config::load_from(path)?,
                None => Config::load()?,
            };

            let options = RunOptions {
                target: Target {
                    base_url: target.unwrap_or(config.target.base_url),
                    protocol: protocol.unwrap_or(config.target.protocol),
                    request_timeout: Duration::from_secs(config.target.request_timeout_secs),
                },
                deadline: deadline.or(config.run.deadline_secs),
                fail_fast: fail_fast || config.run.fail_fast,
                json,
            };
            run(&scenario, &service, &options).await
        }

        Commands::Check { scenario, service } => check(&scenario, service.as_deref()),
    }
}

/// The service under test and how to reach it
#[derive(Debug, Clone)]
pub struct Target {
    pub base_url: String,
    pub protocol: Protocol,
    pub request_timeout: Duration,
}

/// Effective settings for `stest run`, after flags override the config file
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target: Target,
    pub deadline: Option<u64>,
    pub fail_fast: bool,
    pub json: bool,
}

async fn run(scenario: &Path, service: &Path, options: &RunOptions) -> Result<i32> {
    let document = loader::load_path(scenario)?;
    let descriptor = ServiceDescriptor::load_path(service)?;
    let registry = bind_service(&descriptor, &options.target)?;

    info!(
        service = %descriptor.full_name(),
        target = %options.target.base_url,
        protocol = ?options.target.protocol,
        methods = registry.len(),
        "Bound service"
    );

    let json = options.json;
    if !json {
        report::print_header(&document.name, document.len());
    }

    let runner = Runner::new(&registry).fail_fast(options.fail_fast);
    let deadline = options.deadline.map(Duration::from_secs);
    let execution = run_within(&runner, &document, deadline, |outcome| {
        if !json {
            report::print_case(outcome);
        }
    })
    .await;

    let summary = RunSummary::from_outcomes(&execution.outcomes);
    if json {
        let report = if execution.complete {
            RunReport::new(&document.name, &execution.outcomes)
        } else {
            RunReport::partial(&document.name, &execution.outcomes)
        };
        println!("{}", report.to_json()?);
    } else {
        if !execution.complete {
            println!(
                "  {} {}",
                "!".yellow().bold(),
                format!(
                    "deadline reached, {} of {} cases did not run",
                    document.len() - execution.outcomes.len(),
                    document.len()
                )
                .yellow()
            );
        }
        report::print_summary(&summary);
    }

    match options.deadline {
        Some(secs) if !execution.complete => Err(Error::Timeout(secs)),
        _ => Ok(summary.exit_code()),
    }
}

/// Outcomes of a run that may have been cut short
#[derive(Debug)]
pub struct Execution {
    pub outcomes: Vec<CaseOutcome>,
    /// False when the deadline passed before every case ran
    pub complete: bool,
}

/// Run a scenario, giving up once `deadline` has passed
///
/// Cases that finished in time are kept either way; the one in flight when
/// the deadline hits is dropped.
pub async fn run_within<F>(
    runner: &Runner<'_>,
    document: &ScenarioDocument,
    deadline: Option<Duration>,
    mut on_case: F,
) -> Execution
where
    F: FnMut(&CaseOutcome),
{
    let mut finished = Vec::with_capacity(document.len());
    let execution = runner.run_with_observer(document, |outcome| {
        on_case(outcome);
        finished.push(outcome.clone());
    });

    let complete = match deadline {
        Some(limit) => tokio::time::timeout(limit, execution).await.is_ok(),
        None => {
            execution.await;
            true
        }
    };

    if !complete {
        warn!(
            scenario = %document.name,
            finished = finished.len(),
            "Deadline reached before the scenario finished"
        );
    }

    Execution {
        outcomes: finished,
        complete,
    }
}

/// Bind every method of a service to its endpoint on the target
///
/// With a `proto` file in the manifest, payloads are shaped by the message
/// types it declares. gRPC needs those shapes to encode anything, Connect
/// uses them when present.
pub fn bind_service(descriptor: &ServiceDescriptor, target: &Target) -> Result<MethodRegistry> {
    descriptor.validate()?;
    let service = descriptor.full_name();
    let mut shapes: HashMap<String, MethodShape> = match &descriptor.proto {
        Some(proto) => ProtoSchema::compile(proto)?.shapes(descriptor)?,
        None => HashMap::new(),
    };

    match target.protocol {
        Protocol::Connect => {
            let client = connect::http_client(target.request_timeout)?;
            MethodRegistry::from_descriptor(descriptor, |method| {
                let mut invoker = ConnectInvoker::new(
                    client.clone(),
                    &target.base_url,
                    &service,
                    &method.name,
                    target.request_timeout,
                );
                if let Some(shape) = shapes.remove(&method.name) {
                    invoker = invoker.with_shape(shape);
                }
                let invoker: Arc<dyn Invoker> = Arc::new(invoker);
                Ok(invoker)
            })
        }

        Protocol::Grpc => {
            if descriptor.proto.is_none() {
                return Err(Error::InvalidDescriptor(format!(
                    "service '{}' names no proto file; gRPC calls need one",
                    service
                )));
            }
            let channel = grpc::grpc_channel(&target.base_url, target.request_timeout)?;
            MethodRegistry::from_descriptor(descriptor, |method| {
                let shape = shapes.remove(&method.name).ok_or_else(|| {
                    Error::ProtoSchema(format!("no message types for method '{}'", method.name))
                })?;
                let invoker: Arc<dyn Invoker> = Arc::new(GrpcInvoker::new(
                    channel.clone(),
                    &service,
                    &method.name,
                    shape,
                ));
                Ok(invoker)
            })
        }
    }
}

fn check(scenario: &Path, service: Option<&Path>) -> Result<i32> {
    let document = loader::load_path(scenario)?;
    println!(
        "{} {} {}",
        "✓".green(),
        document.name.white().bold(),
        format!("({} cases)", document.len()).dimmed()
    );

    let Some(service) = service else {
        return Ok(0);
    };

    let descriptor = ServiceDescriptor::load_path(service)?;
    descriptor.validate()?;
    if let Some(proto) = &descriptor.proto {
        ProtoSchema::compile(proto)?.shapes(&descriptor)?;
    }

    let unknown = unknown_actions(&document, &descriptor);
    if unknown.is_empty() {
        println!(
            "  {} every action is declared by {}",
            "✓".green(),
            descriptor.full_name()
        );
        return Ok(0);
    }

    for (index, action) in &unknown {
        println!(
            "  {} Case {} [{}]: not declared by {}",
            "!".yellow().bold(),
            index,
            action,
            descriptor.full_name()
        );
    }
    Ok(1)
}

/// Cases whose action the service does not declare
fn unknown_actions<'a>(
    document: &'a ScenarioDocument,
    descriptor: &ServiceDescriptor,
) -> Vec<(usize, &'a str)> {
    let declared: HashSet<&str> = descriptor.methods.iter().map(|m| m.name.as_str()).collect();

    document
        .iter()
        .enumerate()
        .filter(|(_, case)| !declared.contains(case.action.as_str()))
        .map(|(index, case)| (index, case.action.as_str()))
        .collect()
}
