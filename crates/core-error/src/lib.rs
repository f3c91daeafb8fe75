//! The closed error taxonomy exposed at every RPC boundary of the core.
//!
//! Every user-visible failure is one of the five kinds in [`Error`]. Internal
//! faults (store I/O, subprocess failures, etc.) are normalized to
//! [`Error::InvalidOperation`] with a descriptive, secret-free message.

use snafu::Location;
use snafu::Snafu;

/// The five error kinds a caller of the core can ever observe.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A named resource (session, message, snapshot handle, ...) does not exist.
    #[snafu(display("{resource} not found: {identifier}"))]
    NotFound {
        resource: &'static str,
        identifier: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The requested operation is not valid given the current state.
    #[snafu(display("invalid operation: {message}"))]
    InvalidOperation {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// A sensitive operation was denied by the permission broker.
    #[snafu(display("permission denied for {operation}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()))]
    PermissionDenied {
        operation: String,
        message: Option<String>,
        #[snafu(implicit)]
        location: Location,
    },

    /// Caller-supplied input failed validation.
    #[snafu(display("validation failed{}: {message}", field.as_deref().map(|f| format!(" ({f})")).unwrap_or_default()))]
    Validation {
        field: Option<String>,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// An operation exceeded its deadline.
    #[snafu(display("{operation} timed out after {timeout_ms}ms"))]
    Timeout {
        operation: String,
        timeout_ms: u64,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Error {
    /// Stable, user-displayable kind name. Used by transports that need a
    /// machine-readable tag alongside the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::InvalidOperation { .. } => "invalid_operation",
            Error::PermissionDenied { .. } => "permission_denied",
            Error::Validation { .. } => "validation",
            Error::Timeout { .. } => "timeout",
        }
    }

    /// Construct a `NotFound` for `resource` with the given `identifier`.
    pub fn not_found(resource: &'static str, identifier: impl Into<String>) -> Self {
        NotFoundSnafu {
            resource,
            identifier: identifier.into(),
        }
        .build()
    }

    /// Construct an `InvalidOperation` with a free-form message.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        InvalidOperationSnafu {
            message: message.into(),
        }
        .build()
    }

    /// Construct a `PermissionDenied` for `operation`.
    pub fn permission_denied(operation: impl Into<String>, message: Option<String>) -> Self {
        PermissionDeniedSnafu {
            operation: operation.into(),
            message,
        }
        .build()
    }

    /// Construct a `Validation` error, optionally scoped to a field.
    pub fn validation(field: Option<String>, message: impl Into<String>) -> Self {
        ValidationSnafu {
            field,
            message: message.into(),
        }
        .build()
    }

    /// Construct a `Timeout` error.
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        TimeoutSnafu {
            operation: operation.into(),
            timeout_ms,
        }
        .build()
    }
}

/// Normalize an arbitrary internal fault (store I/O, subprocess failure, ...)
/// into an `InvalidOperation`, per spec §7: internal faults that aren't one
/// of the five kinds are folded into this one rather than leaking their
/// original type across the RPC boundary.
pub fn normalize(context: &str, source: impl std::fmt::Display) -> Error {
    Error::invalid_operation(format!("{context}: {source}"))
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "lib.test.rs"]
mod tests;
