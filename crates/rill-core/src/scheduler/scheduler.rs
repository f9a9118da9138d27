//! Work-stealing scheduler for resumed continuations

use crate::scheduler::{Job, Schedule, Worker, WorkerDeque};
use crate::sync::{Continuation, Failure, Outcome};
use crossbeam_deque::{Injector, Worker as LocalQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Multi-threaded work-stealing scheduler.
///
/// Continuations pushed through the [`Schedule`] impl become jobs on a
/// global injector; worker threads drain their local deques first, then
/// steal from each other, then fall back to the injector. Dropping the
/// scheduler drains all outstanding work before the workers exit, so every
/// pushed continuation runs exactly once.
pub struct Scheduler {
    /// Global injector for jobs without worker affinity.
    injector: Arc<Injector<Job>>,

    /// Worker thread handles.
    workers: Vec<Worker>,

    /// Shutdown signal shared with every worker.
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler with one worker per available core.
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get())
    }

    /// Create a scheduler with `count` workers (at least one).
    pub fn with_workers(count: usize) -> Self {
        let count = count.max(1);
        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        // Local queues are created before any thread spawns so every worker
        // holds stealer handles for all the others.
        let locals: Vec<LocalQueue<Job>> = (0..count).map(|_| LocalQueue::new_lifo()).collect();
        let stealers: Vec<_> = locals.iter().map(|local| local.stealer()).collect();

        let workers = locals
            .into_iter()
            .enumerate()
            .map(|(id, local)| {
                let others = stealers
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != id)
                    .map(|(_, stealer)| stealer.clone())
                    .collect();
                let deque = WorkerDeque::new(local, others, injector.clone());
                Worker::spawn(id, deque, shutdown.clone())
            })
            .collect();

        Self {
            injector,
            workers,
            shutdown,
        }
    }

    /// Hand a job to the pool through the global injector.
    pub fn inject(&self, job: Job) {
        self.injector.push(job);
    }

    /// Number of workers in the pool.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Drain all outstanding work and stop the workers.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in &mut self.workers {
            worker.join();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Send + 'static> Schedule<T> for Scheduler {
    fn push(&self, cont: Continuation<T>, value: T) {
        self.inject(Box::new(move || cont.resume(Outcome::Value(value))));
    }

    fn push_failure(&self, cont: Continuation<T>, failure: Failure) {
        self.inject(Box::new(move || cont.resume(Outcome::Failure(failure))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_scheduler_creation() {
        let scheduler = Scheduler::new();
        assert!(scheduler.num_workers() > 0);
    }

    #[test]
    fn test_inject_runs_job() {
        let scheduler = Scheduler::with_workers(2);
        let (tx, rx) = channel::bounded(1);

        scheduler.inject(Box::new(move || tx.send(42).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn test_push_resumes_continuation_with_value() {
        let scheduler = Scheduler::with_workers(2);
        let (tx, rx) = channel::bounded(1);

        let cont = Continuation::new(move |outcome| tx.send(outcome).unwrap());
        scheduler.push(cont, 7u32);

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Outcome::Value(v) => assert_eq!(v, 7),
            Outcome::Failure(f) => panic!("unexpected failure: {}", f),
        }
    }

    #[test]
    fn test_push_failure_resumes_with_failure() {
        let scheduler = Scheduler::with_workers(2);
        let failure = Failure::message("boom");
        let (tx, rx) = channel::bounded(1);

        let cont = Continuation::new(move |outcome: Outcome<u32>| tx.send(outcome).unwrap());
        scheduler.push_failure(cont, failure.clone());

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            Outcome::Failure(delivered) => assert!(delivered.same_as(&failure)),
            Outcome::Value(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_shutdown_drains_outstanding_jobs() {
        let mut scheduler = Scheduler::with_workers(4);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..500 {
            let done = done.clone();
            scheduler.inject(Box::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }
        scheduler.shutdown();

        assert_eq!(done.load(Ordering::SeqCst), 500);
    }
}
