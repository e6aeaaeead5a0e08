//! Error types
//!
//! Every failure of an invocation ends up as a [`CrudError`]. Request errors
//! (unknown action, missing parameter, ...) never reach a backend; backend
//! errors carry the resource kind and action that failed.

use crate::resource::{Action, ResourceKind};
use thiserror::Error;

/// Failure reported by a backend call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// The request never got a response (DNS, connect, TLS, timeout...)
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },

    /// The backend answered with a non-success status
    #[error("backend rejected request ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    /// The backend answered but the body could not be understood
    #[error("malformed backend response: {message}")]
    Malformed { message: String },
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Not-found rejection, as reported by the stores this tool talks to
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: 404,
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }

    /// True when the backend said the resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Rejected { status, code, .. } => {
                *status == 404 || code == "NOT_FOUND" || code == "USER_NOT_FOUND"
            }
            _ => false,
        }
    }

    /// HTTP status, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A selector string naming no known resource kind or action
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized name '{0}'")]
pub struct UnknownName(pub String);

/// Error raised while validating or dispatching one operation
#[derive(Debug, Error, PartialEq)]
pub enum CrudError {
    #[error("{kind}: unknown action '{action}' (expected create, read, update or delete)")]
    UnknownAction { kind: ResourceKind, action: String },

    #[error("{action}: unknown resource kind '{kind}' (expected identity or document)")]
    UnknownResourceKind { kind: String, action: String },

    #[error("{kind} {action}: missing required parameter '{name}'")]
    MissingParameter {
        kind: ResourceKind,
        action: Action,
        name: String,
    },

    #[error("{kind} {action}: invalid value '{value}' for parameter '{name}'")]
    InvalidParameter {
        kind: ResourceKind,
        action: Action,
        name: String,
        value: String,
    },

    #[error("{kind} {action} failed: {source}")]
    Backend {
        kind: ResourceKind,
        action: Action,
        #[source]
        source: BackendError,
    },
}

impl CrudError {
    /// Caller-correctable errors: nothing was sent to a backend
    pub fn is_request_error(&self) -> bool {
        !matches!(self, Self::Backend { .. })
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        if self.is_request_error() {
            2
        } else {
            1
        }
    }

    /// The underlying backend error, if any
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type CrudResult<T> = std::result::Result<T, CrudError>;
