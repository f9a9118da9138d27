//! Pick mediator: exactly-one-winner arbitration for a selective sync attempt

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;

/// Outcome of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller's alternative is the winner.
    Won,
    /// Another alternative won first; its index is recorded.
    Lost(usize),
}

type NackFn = Box<dyn FnOnce() + Send>;

/// One registered alternative of the attempt.
struct Branch {
    index: usize,
    notified: bool,
    on_nack: Option<NackFn>,
}

/// Arbiter for one selective-synchronization attempt.
///
/// Every alternative offered in the attempt shares one `Pick`. The state
/// transitions at most once from undecided to decided; all later claim
/// attempts observe the same winning index forever. Losing alternatives are
/// cancelled through their nack callbacks, each fired exactly once.
pub struct Pick {
    /// Winning alternative, `None` while undecided.
    decision: AtomicCell<Option<usize>>,
    /// Alternatives registered for this attempt.
    branches: Mutex<Vec<Branch>>,
}

impl Pick {
    /// Create an undecided pick.
    pub fn new() -> Self {
        Self {
            decision: AtomicCell::new(None),
            branches: Mutex::new(Vec::new()),
        }
    }

    /// Atomically claim the attempt for alternative `index`.
    pub fn try_claim(&self, index: usize) -> Claim {
        match self.decision.compare_exchange(None, Some(index)) {
            Ok(_) => Claim::Won,
            Err(Some(winner)) => Claim::Lost(winner),
            // The exchange only fails against a decided value.
            Err(None) => unreachable!("pick claim failed while undecided"),
        }
    }

    /// The winning index, if the attempt is decided.
    pub fn decision(&self) -> Option<usize> {
        self.decision.load()
    }

    /// Whether the attempt has committed to a winner.
    pub fn is_decided(&self) -> bool {
        self.decision.load().is_some()
    }

    /// Record alternative `index` so nacks can reach it.
    ///
    /// Registering after the attempt was decided against the branch marks it
    /// nacked at once. Registering an already-known index is a no-op.
    pub(crate) fn register(&self, index: usize) {
        let mut branches = self.branches.lock();
        if branches.iter().any(|b| b.index == index) {
            return;
        }
        // Decision is re-read under the registry lock: either set_nacks ran
        // before us and we see the decision, or it runs after and sees us.
        let lost = matches!(self.decision.load(), Some(winner) if winner != index);
        branches.push(Branch {
            index,
            notified: lost,
            on_nack: None,
        });
    }

    /// Attach the cancellation action of alternative `index`.
    ///
    /// The callback fires when the attempt is decided against the branch,
    /// exactly once. If that already happened, it fires immediately on the
    /// calling thread. At most one callback per branch; a repeated call
    /// replaces an unfired callback.
    pub fn on_nack(&self, index: usize, callback: impl FnOnce() + Send + 'static) {
        let fire: Option<NackFn>;
        {
            let mut branches = self.branches.lock();
            let lost = matches!(self.decision.load(), Some(winner) if winner != index);
            match branches.iter_mut().find(|b| b.index == index) {
                Some(branch) => {
                    if branch.notified {
                        fire = Some(Box::new(callback));
                    } else if lost {
                        branch.notified = true;
                        fire = Some(Box::new(callback));
                    } else {
                        branch.on_nack = Some(Box::new(callback));
                        fire = None;
                    }
                }
                None => {
                    if lost {
                        branches.push(Branch {
                            index,
                            notified: true,
                            on_nack: None,
                        });
                        fire = Some(Box::new(callback));
                    } else {
                        branches.push(Branch {
                            index,
                            notified: false,
                            on_nack: Some(Box::new(callback)),
                        });
                        fire = None;
                    }
                }
            }
        }
        if let Some(callback) = fire {
            callback();
        }
    }

    /// Nack every registered alternative other than `winner`.
    ///
    /// Each branch is notified at most once across all calls; callbacks run
    /// outside the registry lock.
    pub fn set_nacks(&self, winner: usize) {
        let mut fired = Vec::new();
        {
            let mut branches = self.branches.lock();
            for branch in branches.iter_mut() {
                if branch.index != winner && !branch.notified {
                    branch.notified = true;
                    if let Some(callback) = branch.on_nack.take() {
                        fired.push(callback);
                    }
                }
            }
        }
        for callback in fired {
            callback();
        }
    }

    /// Whether alternative `index` has been notified that it lost.
    pub fn is_nacked(&self, index: usize) -> bool {
        self.branches
            .lock()
            .iter()
            .any(|b| b.index == index && b.notified)
    }
}

impl Default for Pick {
    fn default() -> Self {
        Self::new()
    }
}
