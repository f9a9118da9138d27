//! Rill core runtime
//!
//! Write-once promise cells with Concurrent-ML-style selective
//! synchronization:
//! - Promise cells (write-once value/failure containers)
//! - Pick mediators (exactly-one-winner arbitration with nacks)
//! - Continuations and the wait queues that park them
//! - A work-stealing scheduler that runs resumed continuations
//!
//! A consumer either blocks a single continuation on one cell or offers a
//! continuation on each of several cells as one synchronization attempt;
//! the attempt's shared pick guarantees exactly one alternative is ever
//! delivered and the losers are cancelled through their nacks. No operation
//! suspends the calling thread; suspension is realized by the scheduler
//! parking continuations until a producer resolves a cell.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod scheduler;
pub mod sync;

pub use scheduler::{DirectScheduler, Job, Schedule, Scheduler};
pub use sync::{offer_all, Claim, Continuation, Failure, Outcome, Pick, Promise, PromiseError};
