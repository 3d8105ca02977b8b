//! Bounded FIFO worker pools.
//!
//! Jobs run in spawn order on a fixed set of named threads. The pending
//! count covers accepted-but-unfinished jobs (queued plus in flight), so
//! callers can shed load before enqueueing. Panics inside a job are
//! caught and logged; a worker never dies with its pool still running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

/// Fixed-size worker pool over a FIFO queue.
pub struct WorkerPool {
    name: String,
    state: Mutex<PoolState>,
    pending: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `workers` threads named `{name}-{index}`.
    ///
    /// With a queue capacity, enqueueing beyond capacity fails instead of
    /// blocking; without one the queue is unbounded.
    pub fn new(name: &str, workers: usize, queue_capacity: Option<usize>) -> Self {
        let (sender, receiver) = match queue_capacity {
            Some(capacity) => crossbeam_channel::bounded::<Job>(capacity),
            None => crossbeam_channel::unbounded::<Job>(),
        };

        let pending = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let receiver: Receiver<Job> = receiver.clone();
            let pending = Arc::clone(&pending);
            let thread_name = format!("{}-{}", name, index);
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || {
                    for job in receiver.iter() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            log::error!("Worker {} caught a panicking task", thread_name);
                        }
                        pending.fetch_sub(1, Ordering::SeqCst);
                    }
                })
                .unwrap_or_else(|e| panic!("Failed to spawn worker thread {}: {}", name, e));
            handles.push(handle);
        }

        Self {
            name: name.to_string(),
            state: Mutex::new(PoolState {
                sender: Some(sender),
                handles,
            }),
            pending,
        }
    }

    /// Enqueue a job. Returns false when the queue is full or the pool is
    /// shut down.
    pub fn try_execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self.state.lock();
        let Some(sender) = state.sender.as_ref() else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.try_send(Box::new(job)).is_ok() {
            true
        } else {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    /// Accepted jobs not yet finished (queued plus in flight).
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every accepted job has finished, up to `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending_tasks() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Drain the queue and join the workers. Queued jobs still run;
    /// in-flight jobs complete.
    pub fn shutdown(&self) {
        let handles = {
            let mut state = self.state.lock();
            state.sender.take();
            std::mem::take(&mut state.handles)
        };
        for handle in handles {
            if handle.join().is_err() {
                log::error!("Worker thread of pool {} panicked", self.name);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
