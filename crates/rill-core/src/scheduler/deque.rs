//! Work-stealing deque for continuation jobs

use crate::scheduler::Job;
use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use std::sync::Arc;

/// Work-stealing deque for a single worker thread.
pub struct WorkerDeque {
    /// Local deque (LIFO for own jobs).
    local: Worker<Job>,

    /// Stealer handles for the other workers.
    stealers: Vec<Stealer<Job>>,

    /// Global injector for jobs pushed from outside the pool.
    injector: Arc<Injector<Job>>,
}

impl WorkerDeque {
    /// Create a new WorkerDeque.
    pub fn new(local: Worker<Job>, stealers: Vec<Stealer<Job>>, injector: Arc<Injector<Job>>) -> Self {
        Self {
            local,
            stealers,
            injector,
        }
    }

    /// Push a job to the local deque (LIFO).
    pub fn push(&self, job: Job) {
        self.local.push(job);
    }

    /// Pop a job from the local deque (LIFO) - most recent job.
    pub fn pop(&self) -> Option<Job> {
        self.local.pop()
    }

    /// Try to get work: local pop, then steal, then inject.
    pub fn find_work(&self) -> Option<Job> {
        // 1. Try the local deque (LIFO - cache locality)
        if let Some(job) = self.local.pop() {
            return Some(job);
        }

        // 2. Try stealing from other workers (FIFO - load balancing)
        loop {
            if let Some(job) = self.steal_from_others() {
                return Some(job);
            }

            // 3. Try the global injector
            match self.injector.steal() {
                Steal::Success(job) => return Some(job),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        None
    }

    /// Steal from other workers (FIFO from their deque bottom).
    fn steal_from_others(&self) -> Option<Job> {
        use rand::Rng;

        if self.stealers.is_empty() {
            return None;
        }

        // Randomly select a victim to reduce contention
        let mut rng = rand::thread_rng();
        let start = rng.gen_range(0..self.stealers.len());

        for i in 0..self.stealers.len() {
            let stealer = &self.stealers[(start + i) % self.stealers.len()];

            // Retry loop for stealing (handle concurrent modifications)
            loop {
                match stealer.steal() {
                    Steal::Success(job) => return Some(job),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    /// Check if the local deque is empty (approximate).
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}
