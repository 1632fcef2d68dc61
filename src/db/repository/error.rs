//! Error types for the storage gateway.
//!
//! Every error carries an [`ErrorContext`] naming the operation and the row
//! it touched, plus a retryability hint consumed by backends that run retry
//! loops.

use std::fmt;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Where an error occurred and what it hit.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Gateway operation, e.g. "insert_allocation".
    pub operation: Option<String>,
    /// Row or entity the operation targeted, e.g. "allocation 42".
    pub target: Option<String>,
    /// Free-form extra detail (attempt counts, driver codes).
    pub details: Option<String>,
    /// Whether retrying the operation can reasonably succeed.
    pub retryable: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_detail(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut sep = "";
        for (key, value) in [
            ("operation", &self.operation),
            ("target", &self.target),
            ("details", &self.details),
        ] {
            if let Some(value) = value {
                write!(f, "{}{}={}", sep, key, value)?;
                sep = ", ";
            }
        }
        if self.retryable {
            write!(f, "{}retryable", sep)?;
        }
        write!(f, ")")
    }
}

/// Failure of a storage gateway call.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Could not reach the store or obtain a pooled connection. Usually
    /// transient.
    #[error("connection failure: {message} {context}")]
    Connection {
        message: String,
        context: ErrorContext,
    },

    /// The store rejected or failed a statement.
    #[error("query failed: {message} {context}")]
    Query {
        message: String,
        context: ErrorContext,
    },

    /// The referenced row does not exist.
    #[error("not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// A record failed validation on its way in or out of the store.
    #[error("invalid data: {message} {context}")]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// The backend is misconfigured or could not be initialized.
    #[error("configuration error: {message} {context}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// A bug or an unexpected driver state.
    #[error("internal error: {message} {context}")]
    Internal {
        message: String,
        context: ErrorContext,
    },

    /// A call exceeded its deadline. Usually transient.
    #[error("timed out: {message} {context}")]
    Timeout {
        message: String,
        context: ErrorContext,
    },
}

impl RepositoryError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    /// Attach a context, keeping a retryable default if the variant set one.
    pub fn with_context(mut self, mut context: ErrorContext) -> Self {
        context.retryable |= self.context_ref().retryable;
        *self.context_mut() = context;
        self
    }

    /// Name (or rename) the operation in the attached context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Whether a retry loop should take another attempt at this error.
    pub fn is_retryable(&self) -> bool {
        self.context_ref().retryable
    }

    fn context_ref(&self) -> &ErrorContext {
        match self {
            Self::Connection { context, .. }
            | Self::Query { context, .. }
            | Self::NotFound { context, .. }
            | Self::Validation { context, .. }
            | Self::Configuration { context, .. }
            | Self::Internal { context, .. }
            | Self::Timeout { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Connection { context, .. }
            | Self::Query { context, .. }
            | Self::NotFound { context, .. }
            | Self::Validation { context, .. }
            | Self::Configuration { context, .. }
            | Self::Internal { context, .. }
            | Self::Timeout { context, .. } => context,
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match err {
            Error::NotFound => RepositoryError::not_found("row does not exist"),
            Error::DatabaseError(kind, info) => {
                // Serialization failures are safe to retry; everything else
                // the caller has to look at.
                let mut context =
                    ErrorContext::default().with_detail(format!("db_error_kind={:?}", kind));
                if matches!(kind, DatabaseErrorKind::SerializationFailure) {
                    context = context.retryable();
                }
                RepositoryError::query(info.message().to_string()).with_context(context)
            }
            Error::QueryBuilderError(e) => {
                RepositoryError::query(format!("query builder: {}", e))
            }
            Error::DeserializationError(e) | Error::SerializationError(e) => {
                RepositoryError::internal(format!("row conversion: {}", e))
            }
            other => RepositoryError::query(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::connection(err.to_string())
            .with_context(ErrorContext::default().with_detail("pool").retryable())
    }
}
