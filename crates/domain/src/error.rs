//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`TwinError`]
//! via `#[from]`; adapter crates wrap their failures in
//! [`TwinError::CommandFailed`] when they cross a port boundary.

use crate::value::ValueKind;

/// Top-level error returned by every twin operation.
#[derive(Debug, thiserror::Error)]
pub enum TwinError {
    #[error("invalid state")]
    InvalidState(#[from] InvalidStateError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A command body failed with an error of its own.
    #[error("command failed")]
    CommandFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// One sub-command of a batch failed; the others still ran.
    #[error("sub-command {index} of batch failed")]
    BatchFailed {
        index: usize,
        #[source]
        source: Box<TwinError>,
    },

    /// A command body panicked; the gateway thread survived.
    #[error("command panicked: {0}")]
    CommandPanicked(String),

    /// The command was still queued when the gateway stopped.
    #[error("gateway shut down before the command was executed")]
    ShuttingDown,

    /// The command result was dropped without being resolved.
    #[error("command was abandoned without a result")]
    Abandoned,

    /// The gateway no longer accepts commands.
    #[error("gateway is stopped")]
    Stopped,
}

impl TwinError {
    /// Wrap an arbitrary error raised inside a command body.
    pub fn command(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::CommandFailed(Box::new(err))
    }

    /// Whether this error (or the failed sub-command it wraps) is an invalid-state error.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        match self {
            Self::InvalidState(_) => true,
            Self::BatchFailed { source, .. } => source.is_invalid_state(),
            _ => false,
        }
    }
}

/// Programmer errors: an object was used outside of its valid lifetime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStateError {
    #[error("handle used after its command completed")]
    ScopeClosed,

    #[error("handle used outside of the gateway thread")]
    ForeignThread,

    #[error("notification accumulator already completed")]
    AlreadyCompleted,
}

/// A provider, service or resource does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} '{path}' not found")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub path: String,
}

impl NotFoundError {
    #[must_use]
    pub fn provider(name: &str) -> Self {
        Self {
            kind: "provider",
            path: name.to_string(),
        }
    }

    #[must_use]
    pub fn service(provider: &str, service: &str) -> Self {
        Self {
            kind: "service",
            path: format!("{provider}/{service}"),
        }
    }

    #[must_use]
    pub fn resource(provider: &str, service: &str, resource: &str) -> Self {
        Self {
            kind: "resource",
            path: format!("{provider}/{service}/{resource}"),
        }
    }
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name '{0}' must not contain '/'")]
    InvalidName(String),

    #[error("model '{model}' does not declare resource '{path}'")]
    UndeclaredResource { model: String, path: String },

    #[error("provider '{provider}' already uses model '{existing}', not '{requested}'")]
    ModelMismatch {
        provider: String,
        existing: String,
        requested: String,
    },

    #[error("resource '{0}' is fixed and already has a value")]
    FixedValue(String),

    #[error("resource '{0}' cannot be modified by sessions")]
    NotModifiable(String),

    #[error("resource '{path}' expects {expected} values, got {actual}")]
    KindMismatch {
        path: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("action resource '{0}' does not hold a value")]
    ActionValue(String),

    #[error("resource '{0}' is not an action")]
    NotAnAction(String),

    #[error("no action handler registered for '{0}'")]
    NoActionHandler(String),

    #[error("the admin service cannot be removed")]
    AdminService,

    #[error("invalid topic pattern '{0}'")]
    InvalidTopicPattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_invalid_state_into_twin_error() {
        let err: TwinError = InvalidStateError::ScopeClosed.into();
        assert!(err.is_invalid_state());
    }

    #[test]
    fn should_detect_invalid_state_inside_batch_failure() {
        let err = TwinError::BatchFailed {
            index: 2,
            source: Box::new(InvalidStateError::AlreadyCompleted.into()),
        };
        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "sub-command 2 of batch failed");
    }

    #[test]
    fn should_format_not_found_path() {
        let err = NotFoundError::resource("lamp", "light", "level");
        assert_eq!(err.to_string(), "resource 'lamp/light/level' not found");
    }

    #[test]
    fn should_not_report_validation_as_invalid_state() {
        let err: TwinError = ValidationError::EmptyName.into();
        assert!(!err.is_invalid_state());
    }

    #[test]
    fn should_wrap_foreign_error_as_command_failure() {
        let io = std::io::Error::other("boom");
        let err = TwinError::command(io);
        assert!(matches!(err, TwinError::CommandFailed(_)));
    }
}
