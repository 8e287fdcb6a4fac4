//! Scenario runner
//!
//! Executes the cases of a scenario document in order against a method
//! registry. Each case is isolated: whatever happens to one case (including
//! a fatal verdict) the next one still runs.
//!
//! A case takes one of two paths:
//! - error expectation: a single attempt whose status code must equal
//!   `expected_error_code`; `loop` and `success_rule` do not apply.
//! - value comparison: up to `loop` attempts, each preceded by `sleep`,
//!   judged by the action's comparison and combined by `success_rule`.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::rpc::registry::{MethodBinding, MethodRegistry};
use crate::rpc::status::{code_of, Code};

use super::config::{ScenarioDocument, SuccessRule, TestCase};
use super::verdict::{CaseFailure, CaseFatal, CaseOutcome, CaseVerdict};

/// Runs scenario documents against a registry
pub struct Runner<'a> {
    registry: &'a MethodRegistry,
    fail_fast: bool,
}

impl<'a> Runner<'a> {
    pub fn new(registry: &'a MethodRegistry) -> Self {
        Self {
            registry,
            fail_fast: false,
        }
    }

    /// Stop after the first case that does not pass
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Run every case and collect the outcomes in document order
    pub async fn run(&self, document: &ScenarioDocument) -> Vec<CaseOutcome> {
        self.run_with_observer(document, |_| {}).await
    }

    /// Run every case, handing each outcome to `on_case` as soon as it is known
    pub async fn run_with_observer<F>(
        &self,
        document: &ScenarioDocument,
        mut on_case: F,
    ) -> Vec<CaseOutcome>
    where
        F: FnMut(&CaseOutcome),
    {
        info!(scenario = %document.name, cases = document.len(), "Running scenario");

        let mut outcomes = Vec::with_capacity(document.len());
        for (index, case) in document.iter().enumerate() {
            let outcome = run_case(self.registry, index, case).await;
            on_case(&outcome);

            let stop = self.fail_fast && !outcome.verdict.is_pass();
            outcomes.push(outcome);
            if stop {
                info!(index, "Stopping after first case that did not pass");
                break;
            }
        }
        outcomes
    }
}

/// Run a whole document with default options
pub async fn run(document: &ScenarioDocument, registry: &MethodRegistry) -> Vec<CaseOutcome> {
    Runner::new(registry).run(document).await
}

/// Run a single case
pub async fn run_case(registry: &MethodRegistry, index: usize, case: &TestCase) -> CaseOutcome {
    let (verdict, attempts) = match execute_case(registry, case).await {
        Ok(judged) => judged,
        Err(fatal) => (CaseVerdict::Fatal(fatal), 0),
    };

    match &verdict {
        CaseVerdict::Pass => info!(index, action = %case.action, attempts, "Case passed"),
        CaseVerdict::Fail(failure) => {
            info!(index, action = %case.action, attempts, %failure, "Case failed")
        }
        CaseVerdict::Fatal(fatal) => warn!(index, action = %case.action, %fatal, "Case could not run"),
    }

    CaseOutcome {
        index,
        action: case.action.clone(),
        verdict,
        attempts,
    }
}

type Judged = Result<(CaseVerdict, u32), CaseFatal>;

async fn execute_case(registry: &MethodRegistry, case: &TestCase) -> Judged {
    let binding = registry
        .get(&case.action)
        .ok_or_else(|| CaseFatal::UnknownAction(case.action.clone()))?;

    let request = case
        .request
        .as_ref()
        .ok_or_else(|| CaseFatal::MalformedCase("request is required".to_string()))?;
    let request = binding
        .invoker
        .decode_request(request)
        .map_err(|e| CaseFatal::decode("request", e))?;

    if case.error_expectation {
        expect_error(binding, case, &request).await
    } else {
        expect_response(binding, case, &request).await
    }
}

/// Single-shot status code assertion
async fn expect_error(binding: &MethodBinding, case: &TestCase, request: &Value) -> Judged {
    let raw = case.expected_error_code.ok_or_else(|| {
        CaseFatal::MalformedCase(
            "expected_error_code is required when error_expectation is true".to_string(),
        )
    })?;
    let expected = Code::from_i64(raw).ok_or_else(|| {
        CaseFatal::MalformedCase(format!("expected_error_code {} is not a status code", raw))
    })?;

    pause(case.sleep, 1).await;
    debug!(action = %case.action, "Invoking (error expectation)");
    let actual = code_of(&binding.invoker.invoke(request).await);

    let verdict = if actual == expected {
        CaseVerdict::Pass
    } else {
        CaseVerdict::Fail(CaseFailure::ErrorCodeMismatch { expected, actual })
    };
    Ok((verdict, 1))
}

/// Repeated value comparison governed by the success rule
async fn expect_response(binding: &MethodBinding, case: &TestCase, request: &Value) -> Judged {
    if case.loop_count == 0 {
        return Err(CaseFatal::MalformedCase("loop must be at least 1".to_string()));
    }
    let expected = case.expected_response.as_ref().ok_or_else(|| {
        CaseFatal::MalformedCase(
            "expected_response is required unless error_expectation is true".to_string(),
        )
    })?;
    let expected = binding
        .invoker
        .decode_response(expected)
        .map_err(|e| CaseFatal::decode("expected_response", e))?;

    let mut attempt = 1;
    loop {
        pause(case.sleep, attempt).await;
        debug!(action = %case.action, attempt, of = case.loop_count, "Invoking");

        let outcome = attempt_once(binding, request, &expected, attempt).await;
        match judge_attempt(case.success_rule, attempt, case.loop_count, outcome) {
            Step::Retry => attempt += 1,
            Step::Finish(verdict) => return Ok((verdict, attempt)),
        }
    }
}

async fn attempt_once(
    binding: &MethodBinding,
    request: &Value,
    expected: &Value,
    attempt: u32,
) -> Result<(), CaseFailure> {
    let actual = binding
        .invoker
        .invoke(request)
        .await
        .map_err(|status| CaseFailure::InvocationFailure { attempt, status })?;

    let actual = binding
        .invoker
        .decode_response(&actual)
        .map_err(|e| CaseFailure::ComparisonMismatch {
            attempt,
            detail: format!("response does not fit the response shape: {}", e),
        })?;

    binding
        .comparison
        .compare(expected, &actual)
        .map_err(|detail| CaseFailure::ComparisonMismatch { attempt, detail })
}

/// What the retry loop does after an attempt
#[derive(Debug, PartialEq)]
enum Step {
    Retry,
    Finish(CaseVerdict),
}

/// Combine one attempt's outcome with the success rule
///
/// Terminal conditions: early failure under `All`, early success under
/// `Once`, or the final attempt.
fn judge_attempt(
    rule: SuccessRule,
    attempt: u32,
    loop_count: u32,
    outcome: Result<(), CaseFailure>,
) -> Step {
    let last = attempt >= loop_count;
    match (rule, outcome) {
        (SuccessRule::All, Err(failure)) => Step::Finish(CaseVerdict::Fail(failure)),
        (SuccessRule::All, Ok(())) if last => Step::Finish(CaseVerdict::Pass),
        (SuccessRule::All, Ok(())) => Step::Retry,
        (SuccessRule::Once, Ok(())) => Step::Finish(CaseVerdict::Pass),
        (SuccessRule::Once, Err(failure)) if last => Step::Finish(CaseVerdict::Fail(failure)),
        (SuccessRule::Once, Err(_)) => Step::Retry,
    }
}

async fn pause(seconds: u64, attempt: u32) {
    if seconds > 0 {
        debug!(attempt, seconds, "Sleeping before attempt");
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }
}
