//! Rejections the gateway answers a request with.
//!
//! Each [`ErrorCode`] maps to a fixed HTTP status via [`ErrorCode::status`],
//! and a [`Rejection`] renders as
//! `{"detail": {"code": "...", "message": "..."}}`.

use std::fmt;

use agenthub_delegation::ScopeViolation;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Response, StatusCode,
    header::{CONTENT_TYPE, HeaderValue},
};
use serde::Serialize;
use serde_json::{Value, json};

/// Why a delegated request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    // 401 Unauthorized
    /// The delegation token could not be verified, or its chain could not be
    /// loaded
    #[serde(rename = "delegation.invalid")]
    Invalid,

    // 403 Forbidden
    /// A hop in the stored chain delegated more than its parent held
    #[serde(rename = "delegation.scope_escalation")]
    ScopeEscalation,
    /// The token does not carry the scope the route requires
    #[serde(rename = "delegation.insufficient_scope")]
    InsufficientScope,
}

impl ErrorCode {
    /// The wire form of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Invalid => "delegation.invalid",
            ErrorCode::ScopeEscalation => "delegation.scope_escalation",
            ErrorCode::InsufficientScope => "delegation.insufficient_scope",
        }
    }

    /// The HTTP status for this code.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::Invalid => StatusCode::UNAUTHORIZED,
            ErrorCode::ScopeEscalation | ErrorCode::InsufficientScope => StatusCode::FORBIDDEN,
        }
    }

    /// The HTTP status for this code, as a number.
    pub fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal answer to a delegated request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Rejection {
    /// The error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl Rejection {
    /// Create a new rejection.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The token or its chain could not be trusted.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, message)
    }

    /// A stored chain widened scope at some hop.
    pub fn scope_escalation(violation: &ScopeViolation) -> Self {
        Self::new(
            ErrorCode::ScopeEscalation,
            format!("Delegation chain escalates scope: {violation}"),
        )
    }

    /// The token lacks `required`.
    pub fn insufficient_scope(required: &str) -> Self {
        Self::new(
            ErrorCode::InsufficientScope,
            format!("Delegation token lacks required scope: {required}"),
        )
    }

    /// Get the HTTP status code for this rejection.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }

    /// The JSON body sent to the client.
    pub fn body(&self) -> Value {
        json!({
            "detail": {
                "code": self.code,
                "message": self.message,
            }
        })
    }

    /// Render as an HTTP response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body().to_string())));
        *response.status_mut() = self.code.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
