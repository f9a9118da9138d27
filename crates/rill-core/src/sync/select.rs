//! Racing a set of promise cells as one selective-synchronization attempt

use crate::scheduler::Schedule;
use crate::sync::{Continuation, Pick, Promise};
use std::sync::Arc;

/// Offer every `(cell, continuation)` pair as one alternative of the
/// attempt arbitrated by `pick`, indexed in order.
///
/// All alternatives register concurrently: each offer proceeds to the next
/// without waiting, and the shared pick guarantees that exactly one of them
/// is ever delivered. The call returns as soon as the chain has run; it
/// never suspends the caller.
pub fn offer_all<T, S>(
    sched: &Arc<S>,
    pick: &Arc<Pick>,
    alternatives: Vec<(Arc<Promise<T>>, Continuation<T>)>,
) where
    T: Clone + Send + Sync + 'static,
    S: Schedule<T> + 'static,
{
    // Build the chain back to front so each offer holds the rest of it.
    let mut chain: Box<dyn FnOnce() + Send> = Box::new(|| {});
    for (index, (cell, cont)) in alternatives.into_iter().enumerate().rev() {
        let sched = Arc::clone(sched);
        let pick = Arc::clone(pick);
        let next = chain;
        chain = Box::new(move || cell.offer(sched.as_ref(), index, &pick, cont, next));
    }
    chain();
}
