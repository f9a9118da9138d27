//! Resumable units parked on promise cells

use crate::sync::{Failure, Pick};
use std::sync::Arc;

/// The resolved outcome a producer delivers to a continuation.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The cell completed with a value.
    Value(T),
    /// The cell failed; the same instance reaches every reader.
    Failure(Failure),
}

/// How a continuation is attached to a cell.
#[derive(Clone)]
pub(crate) enum ContKind {
    /// Unconditional reader.
    Plain,
    /// One alternative of a selective-synchronization attempt.
    Alt {
        /// Position of this alternative within the attempt.
        index: usize,
        /// Arbiter shared by every alternative of the attempt.
        pick: Arc<Pick>,
    },
}

/// A resumable unit of work parked on a promise cell.
///
/// A continuation is created by a consumer registering interest, held by the
/// cell's wait queue while pending, and handed to the scheduler once a
/// producer resolves the cell. Plain continuations are always delivered;
/// alt continuations are delivered only if their alternative wins its pick.
pub struct Continuation<T> {
    run: Box<dyn FnOnce(Outcome<T>) + Send>,
    kind: ContKind,
}

impl<T> Continuation<T> {
    /// Create an unconditional continuation around its resume closure.
    pub fn new(run: impl FnOnce(Outcome<T>) + Send + 'static) -> Self {
        Self {
            run: Box::new(run),
            kind: ContKind::Plain,
        }
    }

    /// Tag this continuation as alternative `index` of `pick`.
    pub(crate) fn tag_alt(&mut self, index: usize, pick: Arc<Pick>) {
        self.kind = ContKind::Alt { index, pick };
    }

    pub(crate) fn kind(&self) -> &ContKind {
        &self.kind
    }

    /// Run the continuation with its resolved outcome.
    ///
    /// Consumes the continuation, so it runs exactly once. Called by
    /// scheduler implementations on whatever thread executes the job.
    pub fn resume(self, outcome: Outcome<T>) {
        (self.run)(outcome)
    }
}
