//! RPC status codes
//!
//! Uses the gRPC numbering (0 = OK .. 16 = UNAUTHENTICATED), which is what
//! scenario documents put in `expected_error_code`. The snake_case names are
//! the ones Connect puts in error bodies.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// RPC status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

static ALL_CODES: [Code; 17] = [
    Code::Ok,
    Code::Cancelled,
    Code::Unknown,
    Code::InvalidArgument,
    Code::DeadlineExceeded,
    Code::NotFound,
    Code::AlreadyExists,
    Code::PermissionDenied,
    Code::ResourceExhausted,
    Code::FailedPrecondition,
    Code::Aborted,
    Code::OutOfRange,
    Code::Unimplemented,
    Code::Internal,
    Code::Unavailable,
    Code::DataLoss,
    Code::Unauthenticated,
];

impl Code {
    /// Look up a code by its numeric value
    pub fn from_i64(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| ALL_CODES.get(i))
            .copied()
    }

    /// Numeric value of the code
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Snake case name (`invalid_argument`)
    pub fn as_str(self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Cancelled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// Parse a snake case name; both `canceled` and `cancelled` are accepted
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "cancelled" {
            return Some(Code::Cancelled);
        }
        ALL_CODES.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_i32(), self.as_str())
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

/// Failed outcome of an RPC call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

/// Status code observed for a call outcome; a successful call counts as `Ok`
pub fn code_of<T>(outcome: &std::result::Result<T, Status>) -> Code {
    match outcome {
        Ok(_) => Code::Ok,
        Err(status) => status.code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_matches_grpc() {
        assert_eq!(Code::Ok.as_i32(), 0);
        assert_eq!(Code::InvalidArgument.as_i32(), 3);
        assert_eq!(Code::NotFound.as_i32(), 5);
        assert_eq!(Code::Unauthenticated.as_i32(), 16);
    }

    #[test]
    fn test_from_i64() {
        assert_eq!(Code::from_i64(3), Some(Code::InvalidArgument));
        assert_eq!(Code::from_i64(14), Some(Code::Unavailable));
        assert_eq!(Code::from_i64(17), None);
        assert_eq!(Code::from_i64(-1), None);
    }

    #[test]
    fn test_names_round_trip() {
        for code in ALL_CODES {
            assert_eq!(Code::from_name(code.as_str()), Some(code));
        }
        assert_eq!(Code::from_name("cancelled"), Some(Code::Cancelled));
        assert_eq!(Code::from_name("bogus"), None);
    }

    #[test]
    fn test_code_of_success_is_ok() {
        let ok: std::result::Result<(), Status> = Ok(());
        assert_eq!(code_of(&ok), Code::Ok);
        let failed: std::result::Result<(), Status> = Err(Status::invalid_argument("bad"));
        assert_eq!(code_of(&failed), Code::InvalidArgument);
    }

    #[test]
    fn test_status_display() {
        let status = Status::new(Code::NotFound, "no such user");
        assert_eq!(status.to_string(), "5 (not_found): no such user");
    }
}
