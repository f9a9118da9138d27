//! Write-once promise cell with selective-synchronization support

use crate::scheduler::Schedule;
use crate::sync::continuation::ContKind;
use crate::sync::queue::WaitQueue;
use crate::sync::{Claim, Continuation, Failure, Outcome, Pick};
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicI8, Ordering};
use std::sync::Arc;

/// Errors from resolving a promise cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PromiseError {
    /// `complete` or `fail` was called on an already-resolved cell.
    #[error("promise already resolved")]
    AlreadyResolved,
}

// State tags, ordered so `< 0` is terminal, `0` is idle and `> 0` is the
// transient window serializing queue access.
const FAILED: i8 = -2;
const COMPLETED: i8 = -1;
const RUNNING: i8 = 0;
const LOCKED: i8 = 1;

/// A write-once container that yields its value (or failure) to every
/// waiting continuation.
///
/// A cell can be read two ways: [`block`](Promise::block) parks a plain
/// continuation until the cell resolves, and [`offer`](Promise::offer)
/// registers the cell as one alternative of a selective-synchronization
/// attempt, where a shared [`Pick`] guarantees exactly one alternative is
/// ever delivered. Neither operation suspends the calling thread; waiting
/// is realized entirely by the scheduler parking the continuation.
///
/// State machine:
///
/// ```text
/// Running ⇄ Locked          register a reader (net no-op to observers)
/// Running → Locked → Completed   complete(), exactly once
/// Running → Locked → Failed      fail(), exactly once
/// ```
///
/// Terminal states never leave. The Locked window covers only a queue-head
/// read-modify-write, so the CAS spin that guards it is bounded.
pub struct Promise<T> {
    /// `FAILED | COMPLETED | RUNNING | LOCKED`.
    state: AtomicI8,
    /// Resolved outcome; written once inside the Locked window.
    outcome: UnsafeCell<Option<Outcome<T>>>,
    /// Parked readers; touched only inside the Locked window.
    queue: UnsafeCell<WaitQueue<T>>,
}

// SAFETY: the state machine serializes all slot access. The outcome slot is
// written once inside the Locked window and read only after a terminal state
// was observed through an Acquire load; the queue is mutated only inside the
// Locked window. `T: Sync` is required because terminal readers clone the
// value through a shared reference from multiple threads.
unsafe impl<T: Send> Send for Promise<T> {}
unsafe impl<T: Send + Sync> Sync for Promise<T> {}

impl<T> Promise<T> {
    /// Create an empty cell in the Running state.
    pub fn new() -> Self {
        Self {
            state: AtomicI8::new(RUNNING),
            outcome: UnsafeCell::new(None),
            queue: UnsafeCell::new(WaitQueue::new()),
        }
    }

    /// Create a cell already completed with `value`.
    ///
    /// Readers of a pre-resolved cell are resolved synchronously; no wait
    /// queue entry ever materializes.
    pub fn completed(value: T) -> Self {
        Self {
            state: AtomicI8::new(COMPLETED),
            outcome: UnsafeCell::new(Some(Outcome::Value(value))),
            queue: UnsafeCell::new(WaitQueue::new()),
        }
    }

    /// Create a cell already failed with `failure`.
    pub fn failed(failure: Failure) -> Self {
        Self {
            state: AtomicI8::new(FAILED),
            outcome: UnsafeCell::new(Some(Outcome::Failure(failure))),
            queue: UnsafeCell::new(WaitQueue::new()),
        }
    }

    /// Whether the cell has not reached a terminal state yet.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) >= RUNNING
    }

    /// Whether the cell completed with a value.
    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETED
    }

    /// Whether the cell resolved to a failure.
    pub fn is_failed(&self) -> bool {
        self.state.load(Ordering::Acquire) == FAILED
    }

    /// The stored failure if the cell failed; an O(1) read.
    pub fn failure(&self) -> Option<Failure> {
        if self.state.load(Ordering::Acquire) != FAILED {
            return None;
        }
        // SAFETY: a terminal state was observed; the slot is immutable now.
        match unsafe { self.outcome_ref() } {
            Outcome::Failure(failure) => Some(failure.clone()),
            Outcome::Value(_) => unreachable!("failed cell holds a value"),
        }
    }

    /// Number of parked readers at the moment of the call.
    pub fn waiting_count(&self) -> usize {
        loop {
            match self.state.load(Ordering::Acquire) {
                RUNNING => {
                    if self.try_lock() {
                        // SAFETY: the Locked window serializes queue access.
                        let count = unsafe { (*self.queue.get()).len() };
                        self.unlock();
                        return count;
                    }
                }
                LOCKED => std::hint::spin_loop(),
                _ => return 0,
            }
        }
    }

    /// Borrow the resolved outcome.
    ///
    /// # Safety
    ///
    /// The caller must have observed a terminal state through an Acquire
    /// load; the slot is immutable from that point on.
    unsafe fn outcome_ref(&self) -> &Outcome<T> {
        match (*self.outcome.get()).as_ref() {
            Some(outcome) => outcome,
            None => unreachable!("terminal cell with an empty outcome slot"),
        }
    }

    fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(RUNNING, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn unlock(&self) {
        self.state.store(RUNNING, Ordering::Release);
    }
}

impl<T: Clone> Promise<T> {
    /// Park `cont` until the cell resolves.
    ///
    /// If the cell is already terminal the continuation is resolved
    /// synchronously with the stored outcome and handed to `sched`; the
    /// calling thread never suspends either way.
    pub fn block(&self, sched: &dyn Schedule<T>, cont: Continuation<T>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                RUNNING => {
                    if self.try_lock() {
                        // SAFETY: the Locked window serializes queue access.
                        unsafe { (*self.queue.get()).push(cont) };
                        self.unlock();
                        return;
                    }
                }
                LOCKED => std::hint::spin_loop(),
                _ => {
                    // SAFETY: terminal state observed; the slot is immutable.
                    let outcome = unsafe { self.outcome_ref() };
                    Self::push_to(sched, cont, outcome);
                    return;
                }
            }
        }
    }

    /// Offer this cell as alternative `index` of the attempt arbitrated by
    /// `pick`, then continue with `next`, the rest of the offer chain.
    ///
    /// All alternatives of one attempt register concurrently: when the cell
    /// is not yet terminal the continuation is tagged and queued, and `next`
    /// runs before this call returns. When the cell is already terminal the
    /// pick is claimed on the spot: a win delivers the continuation after
    /// nacking every other registered alternative; a loss means a winner
    /// existed before this offer started, so nothing further happens and
    /// `next` is not run.
    pub fn offer(
        &self,
        sched: &dyn Schedule<T>,
        index: usize,
        pick: &Arc<Pick>,
        mut cont: Continuation<T>,
        next: impl FnOnce(),
    ) {
        cont.tag_alt(index, pick.clone());
        loop {
            match self.state.load(Ordering::Acquire) {
                RUNNING => {
                    if self.try_lock() {
                        // SAFETY: the Locked window serializes queue access.
                        unsafe { (*self.queue.get()).push(cont) };
                        self.unlock();
                        pick.register(index);
                        next();
                        return;
                    }
                }
                LOCKED => std::hint::spin_loop(),
                _ => {
                    match pick.try_claim(index) {
                        Claim::Won => {
                            pick.set_nacks(index);
                            // SAFETY: terminal state observed; the slot is
                            // immutable.
                            let outcome = unsafe { self.outcome_ref() };
                            Self::push_to(sched, cont, outcome);
                        }
                        // A winner predates this offer; nothing to retract.
                        Claim::Lost(_) => {}
                    }
                    return;
                }
            }
        }
    }

    /// Resolve the cell with `value` and schedule every parked reader.
    ///
    /// Exactly one resolve may ever succeed; a second `complete` or `fail`
    /// returns [`PromiseError::AlreadyResolved`].
    pub fn complete(&self, sched: &dyn Schedule<T>, value: T) -> Result<(), PromiseError> {
        self.resolve(sched, Outcome::Value(value), COMPLETED)
    }

    /// Resolve the cell with `failure`.
    ///
    /// Every current and future reader receives this same failure instance,
    /// unwrapped and unmodified.
    pub fn fail(&self, sched: &dyn Schedule<T>, failure: Failure) -> Result<(), PromiseError> {
        self.resolve(sched, Outcome::Failure(failure), FAILED)
    }

    fn resolve(
        &self,
        sched: &dyn Schedule<T>,
        outcome: Outcome<T>,
        terminal: i8,
    ) -> Result<(), PromiseError> {
        loop {
            match self
                .state
                .compare_exchange(RUNNING, LOCKED, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => break,
                // A reader holds the window; it releases after an O(1) append.
                Err(LOCKED) => std::hint::spin_loop(),
                Err(_) => return Err(PromiseError::AlreadyResolved),
            }
        }

        // SAFETY: we own the Locked window; the slot is written exactly once
        // and the queue is swapped out before the terminal store.
        let waiters = unsafe {
            *self.outcome.get() = Some(outcome);
            (*self.queue.get()).take()
        };
        self.state.store(terminal, Ordering::Release);

        // SAFETY: the cell is terminal; the slot is immutable from here on.
        let outcome = unsafe { self.outcome_ref() };
        // Drain outside the critical section.
        for cont in waiters {
            Self::deliver(sched, cont, outcome);
        }
        Ok(())
    }

    fn deliver(sched: &dyn Schedule<T>, cont: Continuation<T>, outcome: &Outcome<T>) {
        match cont.kind().clone() {
            ContKind::Plain => Self::push_to(sched, cont, outcome),
            ContKind::Alt { index, pick } => match pick.try_claim(index) {
                Claim::Won => {
                    pick.set_nacks(index);
                    Self::push_to(sched, cont, outcome);
                }
                // The branch lost; nack the attempt's remaining losers
                // against the recorded winner and drop the continuation.
                Claim::Lost(winner) => pick.set_nacks(winner),
            },
        }
    }

    fn push_to(sched: &dyn Schedule<T>, cont: Continuation<T>, outcome: &Outcome<T>) {
        match outcome {
            Outcome::Value(value) => sched.push(cont, value.clone()),
            Outcome::Failure(failure) => sched.push_failure(cont, failure.clone()),
        }
    }

    /// Snapshot of the resolved outcome, if any.
    pub fn try_get(&self) -> Option<Outcome<T>> {
        if self.state.load(Ordering::Acquire) >= RUNNING {
            return None;
        }
        // SAFETY: terminal state observed; the slot is immutable.
        Some(unsafe { self.outcome_ref() }.clone())
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            FAILED => "Failed",
            COMPLETED => "Completed",
            RUNNING => "Running",
            _ => "Locked",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::DirectScheduler;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn recording(log: &Arc<Mutex<Vec<Outcome<u32>>>>) -> Continuation<u32> {
        let log = log.clone();
        Continuation::new(move |outcome| log.lock().push(outcome))
    }

    #[test]
    fn test_new_cell_is_pending() {
        let cell: Promise<u32> = Promise::new();
        assert!(cell.is_pending());
        assert!(!cell.is_completed());
        assert!(!cell.is_failed());
        assert!(cell.try_get().is_none());
        assert!(cell.failure().is_none());
        assert_eq!(cell.waiting_count(), 0);
    }

    #[test]
    fn test_block_then_complete_delivers() {
        let cell = Promise::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        cell.block(&DirectScheduler, recording(&log));
        assert_eq!(cell.waiting_count(), 1);
        assert!(log.lock().is_empty());

        cell.complete(&DirectScheduler, 7).unwrap();
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert!(matches!(log[0], Outcome::Value(7)));
    }

    #[test]
    fn test_block_after_complete_resolves_synchronously() {
        let cell = Promise::new();
        cell.complete(&DirectScheduler, 3).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        cell.block(&DirectScheduler, recording(&log));

        assert!(matches!(log.lock()[0], Outcome::Value(3)));
        assert_eq!(cell.waiting_count(), 0);
    }

    #[test]
    fn test_pre_completed_constructor() {
        let cell = Promise::completed(11);
        assert!(cell.is_completed());
        assert!(matches!(cell.try_get(), Some(Outcome::Value(11))));

        let log = Arc::new(Mutex::new(Vec::new()));
        cell.block(&DirectScheduler, recording(&log));
        assert!(matches!(log.lock()[0], Outcome::Value(11)));
        assert_eq!(cell.waiting_count(), 0);
    }

    #[test]
    fn test_pre_failed_constructor_replays_failure() {
        let failure = Failure::message("seeded");
        let cell: Promise<u32> = Promise::failed(failure.clone());
        assert!(cell.is_failed());
        assert!(cell.failure().unwrap().same_as(&failure));

        let log = Arc::new(Mutex::new(Vec::new()));
        cell.block(&DirectScheduler, recording(&log));
        match &log.lock()[0] {
            Outcome::Failure(delivered) => assert!(delivered.same_as(&failure)),
            Outcome::Value(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_fail_delivers_same_instance_to_all_readers() {
        let cell: Promise<u32> = Promise::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            cell.block(&DirectScheduler, recording(&log));
        }

        let failure = Failure::message("boom");
        cell.fail(&DirectScheduler, failure.clone()).unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 3);
        for outcome in log.iter() {
            match outcome {
                Outcome::Failure(delivered) => assert!(delivered.same_as(&failure)),
                Outcome::Value(_) => panic!("expected failure"),
            }
        }
        assert!(cell.failure().unwrap().same_as(&failure));
    }

    #[test]
    fn test_double_complete_is_rejected() {
        let cell = Promise::new();
        assert!(cell.complete(&DirectScheduler, 1).is_ok());
        assert_eq!(
            cell.complete(&DirectScheduler, 2),
            Err(PromiseError::AlreadyResolved)
        );
        assert_eq!(
            cell.fail(&DirectScheduler, Failure::message("late")),
            Err(PromiseError::AlreadyResolved)
        );
        // The first resolution is untouched.
        assert!(matches!(cell.try_get(), Some(Outcome::Value(1))));
    }

    #[test]
    fn test_fail_then_complete_is_rejected() {
        let cell: Promise<u32> = Promise::new();
        let failure = Failure::message("first");
        assert!(cell.fail(&DirectScheduler, failure.clone()).is_ok());
        assert_eq!(
            cell.complete(&DirectScheduler, 9),
            Err(PromiseError::AlreadyResolved)
        );
        assert!(cell.failure().unwrap().same_as(&failure));
    }

    #[test]
    fn test_offer_queues_and_continues_chain() {
        let cell: Promise<u32> = Promise::new();
        let pick = Arc::new(Pick::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let chained = Arc::new(AtomicUsize::new(0));

        let captured = chained.clone();
        cell.offer(&DirectScheduler, 0, &pick, recording(&log), move || {
            captured.fetch_add(1, AtomicOrdering::SeqCst);
        });

        assert_eq!(chained.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(cell.waiting_count(), 1);
        assert!(!pick.is_decided());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_offered_alternative_wins_on_completion() {
        let cell = Promise::new();
        let pick = Arc::new(Pick::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        cell.offer(&DirectScheduler, 0, &pick, recording(&log), || {});
        cell.complete(&DirectScheduler, 5).unwrap();

        assert_eq!(pick.decision(), Some(0));
        assert!(matches!(log.lock()[0], Outcome::Value(5)));
    }

    #[test]
    fn test_offer_on_terminal_cell_claims_immediately() {
        let cell = Promise::completed(8);
        let pick = Arc::new(Pick::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let chained = Arc::new(AtomicUsize::new(0));

        let captured = chained.clone();
        cell.offer(&DirectScheduler, 1, &pick, recording(&log), move || {
            captured.fetch_add(1, AtomicOrdering::SeqCst);
        });

        assert_eq!(pick.decision(), Some(1));
        assert!(matches!(log.lock()[0], Outcome::Value(8)));
        // The chain stops once the attempt is decided.
        assert_eq!(chained.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_offer_on_terminal_cell_after_decision_is_inert() {
        let cell = Promise::completed(8);
        let pick = Arc::new(Pick::new());
        pick.try_claim(0);

        let log = Arc::new(Mutex::new(Vec::new()));
        cell.offer(&DirectScheduler, 1, &pick, recording(&log), || {
            panic!("chain must not continue")
        });

        assert!(log.lock().is_empty());
        // No nack owed: the winner predates the offer.
        assert!(!pick.is_nacked(1));
    }

    #[test]
    fn test_losing_branch_is_nacked_on_completion() {
        let first = Arc::new(Promise::new());
        let second = Arc::new(Promise::new());
        let pick = Arc::new(Pick::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let nacked = Arc::new(AtomicUsize::new(0));

        for index in 0..2 {
            let nacked = nacked.clone();
            pick.on_nack(index, move || {
                nacked.fetch_add(1, AtomicOrdering::SeqCst);
            });
        }
        first.offer(&DirectScheduler, 0, &pick, recording(&log), || {});
        second.offer(&DirectScheduler, 1, &pick, recording(&log), || {});

        first.complete(&DirectScheduler, 1).unwrap();
        assert_eq!(pick.decision(), Some(0));
        assert_eq!(nacked.load(AtomicOrdering::SeqCst), 1);
        assert!(pick.is_nacked(1));

        // The losing cell still resolves; its alt reader is simply dropped.
        second.complete(&DirectScheduler, 2).unwrap();
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert!(matches!(log[0], Outcome::Value(1)));
    }
}
