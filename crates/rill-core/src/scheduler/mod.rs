//! Continuation scheduling - the seam to the execution engine and a
//! work-stealing pool that implements it
//!
//! Promise cells never run continuations themselves: every operation takes
//! an explicit [`Schedule`] handle and hands resolved continuations to it.
//! [`Scheduler`] is the bundled work-stealing pool; [`DirectScheduler`]
//! runs everything inline on the calling thread.

mod deque;
mod schedule;
#[allow(clippy::module_inception)]
mod scheduler;
mod worker;

pub use deque::WorkerDeque;
pub use schedule::{DirectScheduler, Schedule};
pub use scheduler::Scheduler;
pub use worker::Worker;

/// A unit of work handed to the pool: a resolved continuation to resume.
pub type Job = Box<dyn FnOnce() + Send + 'static>;
