//! Error types shared by the session store, substep controller and order
//! committer.

use std::time::Duration;

use thiserror::Error;

use crate::schema::FieldError;

/// Which durable store a persistence failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Session,
    Order,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Session => write!(f, "session"),
            StoreKind::Order => write!(f, "order"),
        }
    }
}

/// A read or write against a backing store failed
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failure that may succeed when tried again (lock contention, I/O hiccup)
    #[error("{store} store temporarily unavailable: {message}")]
    Transient { store: StoreKind, message: String },

    /// Failure that retrying will not fix (corrupt data, permissions)
    #[error("{store} store failed: {message}")]
    Permanent { store: StoreKind, message: String },

    #[error("{store} store I/O error: {source}")]
    Io {
        store: StoreKind,
        #[source]
        source: std::io::Error,
    },

    #[error("{store} store contains invalid data: {source}")]
    Corrupt {
        store: StoreKind,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub fn transient(store: StoreKind, message: impl Into<String>) -> Self {
        PersistenceError::Transient {
            store,
            message: message.into(),
        }
    }

    pub fn permanent(store: StoreKind, message: impl Into<String>) -> Self {
        PersistenceError::Permanent {
            store,
            message: message.into(),
        }
    }

    /// Whether a retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            PersistenceError::Transient { .. } => true,
            PersistenceError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            PersistenceError::Permanent { .. } | PersistenceError::Corrupt { .. } => false,
        }
    }

    pub fn store(&self) -> StoreKind {
        match self {
            PersistenceError::Transient { store, .. }
            | PersistenceError::Permanent { store, .. }
            | PersistenceError::Io { store, .. }
            | PersistenceError::Corrupt { store, .. } => *store,
        }
    }
}

/// Errors surfaced by checkout operations
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// One or more fields violate their rules; shown inline, nothing advances
    #[error("section '{section}' has {} invalid field(s)", errors.len())]
    Validation {
        section: String,
        errors: Vec<FieldError>,
    },

    /// Session write failed after retries; the customer can try again
    #[error("could not save section '{section}', please try again: {source}")]
    SessionUnavailable {
        section: String,
        #[source]
        source: PersistenceError,
    },

    /// Order commit gave up; the order must not complete and the session is kept
    #[error("order '{order_id}' could not be saved (section '{section}'): {source}")]
    CommitAborted {
        order_id: String,
        section: String,
        #[source]
        source: PersistenceError,
    },

    /// Order commit exceeded its hard timeout; the session is kept
    #[error("order '{order_id}' commit timed out after {elapsed:?}")]
    CommitTimedOut { order_id: String, elapsed: Duration },

    /// Operation on a section the controller never opened
    #[error("section '{0}' is not open")]
    SectionNotOpen(String),

    /// Event not allowed in the section's current state
    #[error("cannot {action} section '{section}' while it is {state}")]
    InvalidTransition {
        section: String,
        action: &'static str,
        state: String,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl CheckoutError {
    /// Fatal errors abort checkout; everything else is recoverable in place
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CheckoutError::CommitAborted { .. } | CheckoutError::CommitTimedOut { .. }
        )
    }

    /// Field errors, when this is a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            CheckoutError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldErrorKind;

    #[test]
    fn test_retryable_classification() {
        assert!(PersistenceError::transient(StoreKind::Order, "busy").is_retryable());
        assert!(!PersistenceError::permanent(StoreKind::Order, "denied").is_retryable());

        let io = PersistenceError::Io {
            store: StoreKind::Session,
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk"),
        };
        assert!(io.is_retryable());

        let io = PersistenceError::Io {
            store: StoreKind::Session,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "ro"),
        };
        assert!(!io.is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        let aborted = CheckoutError::CommitAborted {
            order_id: "1001".to_string(),
            section: "gift_options".to_string(),
            source: PersistenceError::transient(StoreKind::Order, "busy"),
        };
        assert!(aborted.is_fatal());

        let validation = CheckoutError::Validation {
            section: "contact".to_string(),
            errors: vec![FieldError {
                field: "email".to_string(),
                kind: FieldErrorKind::Required,
            }],
        };
        assert!(!validation.is_fatal());
        assert_eq!(validation.field_errors().len(), 1);
        assert!(validation.to_string().contains("1 invalid field"));
    }

    #[test]
    fn test_error_messages_name_the_store() {
        let err = PersistenceError::transient(StoreKind::Session, "locked");
        assert_eq!(
            err.to_string(),
            "session store temporarily unavailable: locked"
        );
        assert_eq!(err.store(), StoreKind::Session);
    }
}
