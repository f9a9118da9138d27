//! Synchronization primitives for selective synchronization
//!
//! This module provides the write-once promise cell and the machinery that
//! lets one consumer race several cells as a single synchronization event:
//! continuations, per-cell wait queues, and the pick mediator that commits
//! to exactly one winning alternative and nacks the rest.

mod continuation;
mod failure;
mod pick;
mod promise;
mod queue;
mod select;

pub use continuation::{Continuation, Outcome};
pub use failure::Failure;
pub use pick::{Claim, Pick};
pub use promise::{Promise, PromiseError};
pub use select::offer_all;
