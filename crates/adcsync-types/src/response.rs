//! Transport outcome taxonomy
//!
//! Every post to the appliance is reduced to one [`ResponseCode`]. The
//! variant order is the aggregation precedence: when a batch of outcomes is
//! folded into one decision, the earliest variant with a non-zero count
//! wins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified outcome of one post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    /// Appliance unreachable or overloaded
    ServiceUnavailable,
    /// Target absent on the appliance (e.g. deleting a tenant already gone)
    NotFound,
    /// Any other rejection
    CommonError,
    /// Nothing was attempted
    Dummy,
    /// Document rejected deterministically by remote validation
    UnprocessableEntity,
    /// Accepted
    Ok,
}

impl ResponseCode {
    /// All codes in aggregation precedence order
    pub const PRECEDENCE: [ResponseCode; 6] = [
        ResponseCode::ServiceUnavailable,
        ResponseCode::NotFound,
        ResponseCode::CommonError,
        ResponseCode::Dummy,
        ResponseCode::UnprocessableEntity,
        ResponseCode::Ok,
    ];

    /// Classify an HTTP status returned by the appliance
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=202 => ResponseCode::Ok,
            404 => ResponseCode::NotFound,
            422 => ResponseCode::UnprocessableEntity,
            503 => ResponseCode::ServiceUnavailable,
            _ => ResponseCode::CommonError,
        }
    }

    /// Whether an outcome with this code must be retried
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ResponseCode::ServiceUnavailable | ResponseCode::CommonError
        )
    }

    /// Whether this outcome settles a tenant's failure ledger entry
    pub fn settles_failure(self) -> bool {
        matches!(self, ResponseCode::Ok | ResponseCode::UnprocessableEntity)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseCode::ServiceUnavailable => "service_unavailable",
            ResponseCode::NotFound => "not_found",
            ResponseCode::CommonError => "common_error",
            ResponseCode::Dummy => "dummy",
            ResponseCode::UnprocessableEntity => "unprocessable_entity",
            ResponseCode::Ok => "ok",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single post as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostOutcome {
    pub accepted: bool,
    pub code: ResponseCode,
}

impl PostOutcome {
    pub fn from_code(code: ResponseCode) -> Self {
        Self {
            accepted: !code.is_retryable(),
            code,
        }
    }
}
