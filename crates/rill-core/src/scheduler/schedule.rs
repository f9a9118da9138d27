//! Scheduler seam: how resolved continuations reach an executor

use crate::sync::{Continuation, Failure, Outcome};

/// Accepts ready continuations for execution.
///
/// This is the explicit handle every promise operation takes in place of an
/// ambient execution context. Implementations must not block the caller and
/// must eventually run each pushed continuation exactly once. No ordering is
/// promised across continuations originating from different cells; ordering
/// within one drain is incidental, not contractual.
pub trait Schedule<T>: Send + Sync {
    /// Enqueue `cont` to be resumed with `value`.
    fn push(&self, cont: Continuation<T>, value: T);

    /// Enqueue `cont` to be resumed with `failure`.
    fn push_failure(&self, cont: Continuation<T>, failure: Failure);
}

/// Runs continuations immediately on the calling thread.
///
/// Suits tests and single-threaded embeddings: a pushed continuation runs
/// before `push` returns, so continuations must stay short.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectScheduler;

impl<T> Schedule<T> for DirectScheduler {
    fn push(&self, cont: Continuation<T>, value: T) {
        cont.resume(Outcome::Value(value));
    }

    fn push_failure(&self, cont: Continuation<T>, failure: Failure) {
        cont.resume(Outcome::Failure(failure));
    }
}
