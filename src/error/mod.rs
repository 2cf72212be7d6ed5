//! Crate-wide error taxonomy and classification (C15).
//!
//! Every module keeps its own `thiserror` enum (`ConfigError`, `VectorDbError`,
//! `RetrievalError`, …) for precise local matching; this module provides the
//! classified taxonomy those errors roll up into at component boundaries, plus
//! an [`ErrorHandler`] observer list for dispatch.

use std::fmt;
use std::time::Duration;

use tracing::warn;

/// Classified error kind (spec §4.15).
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Network-level failure, with an optional status code.
    Network {
        /// HTTP-like status code, if known.
        status_code: Option<u16>,
    },
    /// Authentication failed.
    Authentication,
    /// Caller lacks permission for the operation.
    Permission,
    /// Input failed validation, optionally naming the offending field.
    Validation {
        /// Offending field name, if identifiable.
        field: Option<String>,
    },
    /// Referenced resource does not exist.
    ResourceNotFound {
        /// Resource type, if known.
        resource_type: Option<String>,
        /// Resource id, if known.
        id: Option<String>,
    },
    /// Operation exceeded its allotted time.
    Timeout {
        /// Configured duration, if known.
        duration: Option<Duration>,
    },
    /// Error originating from an upstream provider.
    Provider {
        /// Provider name.
        name: String,
    },
    /// Client-side misuse.
    Client,
    /// Server-side failure.
    Server,
    /// Unclassified.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network { status_code } => match status_code {
                Some(code) => write!(f, "network error (status {code})"),
                None => write!(f, "network error"),
            },
            ErrorKind::Authentication => write!(f, "authentication error"),
            ErrorKind::Permission => write!(f, "permission error"),
            ErrorKind::Validation { field } => match field {
                Some(field) => write!(f, "validation error (field: {field})"),
                None => write!(f, "validation error"),
            },
            ErrorKind::ResourceNotFound { resource_type, id } => {
                write!(f, "resource not found")?;
                if let Some(resource_type) = resource_type {
                    write!(f, " (type: {resource_type}")?;
                    if let Some(id) = id {
                        write!(f, ", id: {id}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            ErrorKind::Timeout { duration } => match duration {
                Some(d) => write!(f, "timeout after {d:?}"),
                None => write!(f, "timeout"),
            },
            ErrorKind::Provider { name } => write!(f, "provider error ({name})"),
            ErrorKind::Client => write!(f, "client error"),
            ErrorKind::Server => write!(f, "server error"),
            ErrorKind::Unknown => write!(f, "unknown error"),
        }
    }
}

/// A classified error with its original message preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    /// The classified kind.
    pub kind: ErrorKind,
    /// The original message, unmodified.
    pub message: String,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ClassifiedError {}

impl ClassifiedError {
    /// Builds a classified error from a raw message, applying the same
    /// heuristics a generic `ErrorHandler.handle` would apply to an
    /// untyped thrown value.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        let kind = if lower.contains("timeout") || lower.contains("timed out") {
            ErrorKind::Timeout { duration: None }
        } else if lower.contains("permission") || lower.contains("forbidden") {
            ErrorKind::Permission
        } else if lower.contains("unauthorized")
            || lower.contains("unauthenticated")
            || lower.contains("invalid token")
            || lower.contains("token expired")
        {
            ErrorKind::Authentication
        } else if lower.contains("not found") || lower.contains("no such") {
            ErrorKind::ResourceNotFound {
                resource_type: None,
                id: None,
            }
        } else if lower.contains("invalid") || lower.contains("must be") || lower.contains("required") {
            ErrorKind::Validation { field: None }
        } else if lower.contains("connection") || lower.contains("network") || lower.contains("dns") {
            ErrorKind::Network { status_code: None }
        } else {
            ErrorKind::Unknown
        };

        Self { kind, message }
    }

    /// Re-tags this error as originating from a named provider, upgrading
    /// generic kinds by inspecting the message for known substrings
    /// (spec §4.15's provider mapper).
    pub fn with_provider(mut self, provider: &str) -> Self {
        let lower = self.message.to_lowercase();

        self.kind = if lower.contains("api key") {
            ErrorKind::Authentication
        } else if lower.contains("rate limit") {
            ErrorKind::Provider {
                name: provider.to_string(),
            }
        } else if lower.contains("timeout") {
            ErrorKind::Timeout { duration: None }
        } else {
            ErrorKind::Provider {
                name: provider.to_string(),
            }
        };

        self
    }
}

/// A registered error callback. Must not panic; a callback that errors is
/// logged and skipped, never allowed to break the dispatcher (design notes:
/// "callback exceptions must not break the emitter").
pub type ErrorCallback = Box<dyn Fn(&ClassifiedError) + Send + Sync>;

/// Observer-list dispatcher for classified errors (spec §4.15).
#[derive(Default)]
pub struct ErrorHandler {
    callbacks: std::sync::RwLock<Vec<ErrorCallback>>,
}

impl ErrorHandler {
    /// Creates an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback, invoked on every [`ErrorHandler::handle`] call.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&ClassifiedError) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.push(Box::new(callback));
        }
    }

    /// Classifies `message`, logs it, and dispatches to every registered
    /// callback in registration order.
    pub fn handle(&self, message: impl Into<String>) -> ClassifiedError {
        let classified = ClassifiedError::classify(message);
        warn!(kind = %classified.kind, "classified error");

        if let Ok(callbacks) = self.callbacks.read() {
            for callback in callbacks.iter() {
                callback(&classified);
            }
        }

        classified
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.callbacks.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn classifies_timeout_messages() {
        let err = ClassifiedError::classify("request timed out after 30s");
        assert_eq!(err.kind, ErrorKind::Timeout { duration: None });
    }

    #[test]
    fn classifies_auth_messages() {
        let err = ClassifiedError::classify("Token expired");
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn provider_mapping_upgrades_rate_limit() {
        let err = ClassifiedError::classify("received 429").with_provider("openai");
        assert_eq!(
            err.kind,
            ErrorKind::Provider {
                name: "openai".into()
            }
        );

        let err = ClassifiedError::classify("rate limit exceeded").with_provider("openai");
        assert_eq!(
            err.kind,
            ErrorKind::Provider {
                name: "openai".into()
            }
        );
    }

    #[test]
    fn handler_dispatches_to_all_callbacks_in_order() {
        let handler = ErrorHandler::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let order_a = Arc::clone(&order);
        handler.on_error(move |_| order_a.lock().unwrap().push(1));
        let order_b = Arc::clone(&order);
        handler.on_error(move |_| order_b.lock().unwrap().push(2));

        handler.handle("something failed");

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn handler_counts_registered_callbacks() {
        let handler = ErrorHandler::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        handler.on_error(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handler.callback_count(), 1);
        handler.handle("boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
