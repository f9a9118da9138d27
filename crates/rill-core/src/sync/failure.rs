//! Shared failure payload of a failed promise cell

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// The terminal failure payload of a promise cell.
///
/// Cloning is cheap and preserves identity: every reader of a failed cell
/// observes the same underlying error instance, which [`Failure::same_as`]
/// can verify. The producer-supplied error is stored verbatim and replayed
/// unmodified to every current and future reader.
#[derive(Clone)]
pub struct Failure {
    inner: Arc<dyn Error + Send + Sync>,
}

impl Failure {
    /// Wrap a producer-supplied error.
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Build a failure from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Borrow the underlying error.
    pub fn get(&self) -> &(dyn Error + Send + Sync) {
        &*self.inner
    }

    /// Whether two handles share the same underlying error instance.
    pub fn same_as(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.inner).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// Failure built from a bare message string.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);
