//! Worker thread that executes resumed continuations

use crate::scheduler::WorkerDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A single pool thread driving a work-stealing deque.
pub struct Worker {
    /// Worker ID within the pool.
    id: usize,

    /// Worker thread handle.
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread.
    ///
    /// The deque is constructed up front by the pool so its stealer handles
    /// are connected to every other worker, then moved onto the new thread.
    pub(crate) fn spawn(id: usize, deque: WorkerDeque, shutdown: Arc<AtomicBool>) -> Self {
        let handle = thread::Builder::new()
            .name(format!("rill-worker-{}", id))
            .spawn(move || Self::run_loop(deque, shutdown))
            .expect("failed to spawn worker thread");

        Self {
            id,
            handle: Some(handle),
        }
    }

    /// Worker ID within the pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Main loop: run jobs until shut down and fully drained.
    fn run_loop(deque: WorkerDeque, shutdown: Arc<AtomicBool>) {
        loop {
            match deque.find_work() {
                Some(job) => job(),
                None => {
                    // Shutdown is honored only once no work is left anywhere,
                    // so every pushed continuation still runs.
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    thread::sleep(Duration::from_micros(100));
                }
            }
        }

        #[cfg(debug_assertions)]
        if let Some(name) = thread::current().name() {
            eprintln!("{} shutting down", name);
        }
    }

    /// Wait for the thread to finish its drain and exit.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            // A worker that panicked already abandoned its jobs; there is
            // nothing left to wait for.
            let _ = handle.join();
        }
    }
}
