//! Case verdicts and run summaries

use thiserror::Error;

use crate::rpc::status::{Code, Status};

/// Verdict for one test case
#[derive(Debug, Clone, PartialEq)]
pub enum CaseVerdict {
    /// The case met its expectation
    Pass,
    /// The case ran and did not meet its expectation
    Fail(CaseFailure),
    /// The case could not be run at all
    Fatal(CaseFatal),
}

impl CaseVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, CaseVerdict::Pass)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CaseVerdict::Fatal(_))
    }

    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            CaseVerdict::Pass => "pass",
            CaseVerdict::Fail(_) => "fail",
            CaseVerdict::Fatal(_) => "fatal",
        }
    }

    /// Human readable reason, if the case did not pass
    pub fn reason(&self) -> Option<String> {
        match self {
            CaseVerdict::Pass => None,
            CaseVerdict::Fail(failure) => Some(failure.to_string()),
            CaseVerdict::Fatal(fatal) => Some(fatal.to_string()),
        }
    }
}

/// Why a case that ran did not pass
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseFailure {
    #[error("expected error code {expected}, got {actual}")]
    ErrorCodeMismatch { expected: Code, actual: Code },

    #[error("attempt {attempt}: response mismatch: {detail}")]
    ComparisonMismatch { attempt: u32, detail: String },

    #[error("attempt {attempt}: call failed with {status}")]
    InvocationFailure { attempt: u32, status: Status },
}

/// Why a case could not be run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseFatal {
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("cannot decode {field}: {message}")]
    DecodeError {
        field: &'static str,
        message: String,
    },

    #[error("malformed case: {0}")]
    MalformedCase(String),
}

impl CaseFatal {
    pub fn decode(field: &'static str, message: impl Into<String>) -> Self {
        Self::DecodeError {
            field,
            message: message.into(),
        }
    }
}

/// Verdict for one case together with where it sits in the document
#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    /// Position of the case in the document
    pub index: usize,
    /// Action the case exercised
    pub action: String,
    pub verdict: CaseVerdict,
    /// Invocations actually made
    pub attempts: u32,
}

/// Aggregate counts over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub fatal: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[CaseOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut summary, outcome| {
                match outcome.verdict {
                    CaseVerdict::Pass => summary.passed += 1,
                    CaseVerdict::Fail(_) => summary.failed += 1,
                    CaseVerdict::Fatal(_) => summary.fatal += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.fatal
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.fatal == 0
    }

    /// Process exit status: 0 all passed, 1 failures, 2 cases that could not run
    pub fn exit_code(&self) -> i32 {
        if self.fatal > 0 {
            2
        } else if self.failed > 0 {
            1
        } else {
            0
        }
    }
}
