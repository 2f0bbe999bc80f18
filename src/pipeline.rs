//! Producer → bounded worker pool → aggregator.
//!
//! ```text
//! Job source (own thread) ──bounded jobs──▶ Worker 0..W ──results──▶ Aggregator (caller thread)
//! ```
//!
//! The job source closes the job queue by returning. Each worker exits once
//! the queue is drained and closed, dropping its result sender; the result
//! queue closes when the last worker has exited, so the aggregator always
//! sees every result before it sees the end of the stream.

use crossbeam_channel::{bounded, Sender};
use std::num::NonZeroUsize;
use std::thread;
use tracing::{debug, warn};

/// Upper bound on size-scan workers regardless of core count.
pub const MAX_SIZE_WORKERS: usize = 8;

/// Worker count used by environment discovery.
pub const DISCOVERY_WORKERS: usize = 4;

/// `min(available_parallelism, 8)`, falling back to one worker.
pub fn default_size_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(MAX_SIZE_WORKERS)
}

/// Handle given to a job source for feeding the pool.
pub struct Dispatcher<J> {
    tx: Sender<J>,
    sent: usize,
}

impl<J> Dispatcher<J> {
    /// Queues a job, blocking while the queue is full.
    ///
    /// Returns `false` if every worker has already gone away.
    pub fn dispatch(&mut self, job: J) -> bool {
        match self.tx.send(job) {
            Ok(()) => {
                self.sent += 1;
                true
            }
            Err(_) => false,
        }
    }

    pub fn dispatched(&self) -> usize {
        self.sent
    }
}

/// Counts reported after a pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub dispatched: usize,
    pub results: usize,
}

/// A fixed number of OS threads pulling jobs from one shared bounded queue.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            capacity: 100,
        }
    }

    /// Sets the job and result queue bound.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `source` on its own thread and `handler` on every worker, feeding
    /// each produced result to `sink` on the calling thread.
    ///
    /// A handler returning `None` emits nothing for that job. Handlers must
    /// absorb their own failures; the pool has no retry and no per-job error
    /// channel.
    pub fn run<J, R, S, H, A>(&self, source: S, handler: H, mut sink: A) -> PoolStats
    where
        J: Send,
        R: Send,
        S: FnOnce(&mut Dispatcher<J>) + Send,
        H: Fn(J) -> Option<R> + Sync,
        A: FnMut(R),
    {
        let (job_tx, job_rx) = bounded::<J>(self.capacity);
        let (result_tx, result_rx) = bounded::<R>(self.capacity);
        let handler = &handler;

        thread::scope(|scope| {
            for id in 0..self.workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    let mut handled = 0usize;
                    for job in job_rx.iter() {
                        handled += 1;
                        if let Some(result) = handler(job) {
                            if result_tx.send(result).is_err() {
                                break;
                            }
                        }
                    }
                    debug!(worker = id, handled, "Worker finished");
                });
            }
            // Workers hold the only remaining senders.
            drop(result_tx);
            drop(job_rx);

            let producer = scope.spawn(move || {
                let mut dispatcher = Dispatcher { tx: job_tx, sent: 0 };
                source(&mut dispatcher);
                dispatcher.dispatched()
            });

            let mut results = 0usize;
            for result in result_rx.iter() {
                results += 1;
                sink(result);
            }

            let dispatched = match producer.join() {
                Ok(count) => count,
                Err(_) => {
                    warn!("Job source panicked");
                    0
                }
            };

            PoolStats {
                dispatched,
                results,
            }
        })
    }

    /// Runs the pool and collects results in arrival order.
    pub fn collect<J, R, S, H>(&self, source: S, handler: H) -> Vec<R>
    where
        J: Send,
        R: Send,
        S: FnOnce(&mut Dispatcher<J>) + Send,
        H: Fn(J) -> Option<R> + Sync,
    {
        let mut out = Vec::new();
        self.run(source, handler, |result| out.push(result));
        out
    }
}
