//! Error taxonomy shared by the runtime adapters, argument validation,
//! the tool registry and the dispatcher.

use std::fmt;

use thiserror::Error;

/// Faults reported by a container runtime backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// The daemon has no container (or image) matching the reference
    #[error("{0}")]
    NotFound(String),

    /// The daemon rejected the request
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    /// The daemon could not be reached or the exchange broke off
    #[error("daemon connection error: {0}")]
    Transport(String),

    /// The daemon answered with something we cannot interpret
    #[error("{0}")]
    Unexpected(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

/// Argument validation failures. Each names the first offending parameter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("parameter '{param}' must be {expected}")]
    TypeMismatch {
        param: String,
        expected: &'static str,
    },

    #[error("parameter '{param}' is invalid: {reason}")]
    ConstraintViolation { param: String, reason: String },
}

impl ValidationError {
    /// Name of the parameter that failed validation
    pub fn param(&self) -> &str {
        match self {
            ValidationError::MissingParameter(param) => param,
            ValidationError::TypeMismatch { param, .. } => param,
            ValidationError::ConstraintViolation { param, .. } => param,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ValidationError::MissingParameter(_) => FailureKind::MissingParameter,
            ValidationError::TypeMismatch { .. } => FailureKind::TypeMismatch,
            ValidationError::ConstraintViolation { .. } => FailureKind::ConstraintViolation,
        }
    }
}

/// Registry construction and lookup failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("tool '{tool}' has an invalid argument schema: {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownOperation(String),
}

/// Classification of a failed invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    UnknownOperation,
    MissingParameter,
    TypeMismatch,
    ConstraintViolation,
    NotFound,
    RuntimeFault,
    UnexpectedFault,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnknownOperation => "unknown_operation",
            FailureKind::MissingParameter => "missing_parameter",
            FailureKind::TypeMismatch => "type_mismatch",
            FailureKind::ConstraintViolation => "constraint_violation",
            FailureKind::NotFound => "not_found",
            FailureKind::RuntimeFault => "runtime_fault",
            FailureKind::UnexpectedFault => "unexpected_fault",
        }
    }

    /// True for the three argument-validation kinds
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FailureKind::MissingParameter
                | FailureKind::TypeMismatch
                | FailureKind::ConstraintViolation
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed invocation as seen by the caller: a kind plus readable text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RuntimeFault, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::UnexpectedFault, message)
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ToolFailure {}
