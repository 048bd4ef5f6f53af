//! Admission control for the worker pool.
//!
//! At most `max_pool_size` jobs run at once. A job admitted while the pool is
//! saturated waits in a FIFO overflow queue; each time a running job finishes,
//! its slot is handed to the oldest queued job.
//!
//! The active count and the queue live behind one mutex. The lock is taken
//! only to make a decision (increment-or-enqueue on admission,
//! decrement-and-promote on release) and is never held across an `.await`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Work executed in one pool slot.
pub trait Worker: Send + Sync + 'static {
    type Job: Send + 'static;

    fn run(&self, job: Self::Job) -> impl Future<Output = ()> + Send;
}

/// Where an admitted job went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free; the job is running
    Dispatched,
    /// The pool is saturated; the job waits in the overflow queue
    Queued,
}

pub struct AdmissionController<W: Worker> {
    worker: W,
    max_pool_size: usize,
    state: Mutex<AdmissionState<W::Job>>,
}

struct AdmissionState<J> {
    active: usize,
    queue: VecDeque<J>,
}

/// Holds one pool slot for the lifetime of a running job.
///
/// Dropping it releases the slot, including when the job panics.
struct WorkerSlot<W: Worker> {
    controller: Arc<AdmissionController<W>>,
}

impl<W: Worker> Drop for WorkerSlot<W> {
    fn drop(&mut self) {
        self.controller.release();
    }
}

impl<W: Worker> AdmissionController<W> {
    /// A pool size of zero is treated as one.
    pub fn new(worker: W, max_pool_size: usize) -> Arc<Self> {
        Arc::new(Self {
            worker,
            max_pool_size: max_pool_size.max(1),
            state: Mutex::new(AdmissionState {
                active: 0,
                queue: VecDeque::new(),
            }),
        })
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Runs `job` now if a slot is free, otherwise queues it.
    pub fn admit(self: &Arc<Self>, job: W::Job) -> Admission {
        let job = {
            let mut state = self.lock();
            if state.active < self.max_pool_size {
                state.active += 1;
                job
            } else {
                state.queue.push_back(job);
                return Admission::Queued;
            }
        };

        // The slot is already reserved; spawning happens outside the lock
        self.spawn(job);
        Admission::Dispatched
    }

    /// Jobs currently running.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Jobs waiting for a slot.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Drops every queued job without running it and returns how many there
    /// were. For connections, dropping closes the socket.
    pub fn drain_queue(&self) -> usize {
        let drained: Vec<W::Job> = self.lock().queue.drain(..).collect();
        drained.len()
    }

    fn release(self: &Arc<Self>) {
        let next = {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
            let next = state.queue.pop_front();
            if next.is_some() {
                state.active += 1;
            }
            next
        };

        if let Some(job) = next {
            self.spawn(job);
        }
    }

    fn spawn(self: &Arc<Self>, job: W::Job) {
        let slot = WorkerSlot {
            controller: Arc::clone(self),
        };

        tokio::spawn(async move {
            slot.controller.worker.run(job).await;
            drop(slot);
        });
    }

    fn lock(&self) -> MutexGuard<'_, AdmissionState<W::Job>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
