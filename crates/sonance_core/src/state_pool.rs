//! Set-State Worker Pool
//!
//! Playbin state changes can block (Paused → Ready joins streaming
//! threads), so pipelines never change state on the caller's thread.
//! Requests go through a bounded queue to a few named workers:
//!
//! ```text
//! Pipeline::set_state ──job──▶ [bounded queue] ──▶ sonance-setstate-0..N
//!        │                                               │
//!        └──── StateChangeHandle ◀──── result slot ◀─────┘
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use sonance_graph::{Playbin, State, StateChangeReturn};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

#[derive(Default)]
struct ResultSlot {
    result: Mutex<Option<StateChangeReturn>>,
    ready: Condvar,
}

impl ResultSlot {
    fn complete(&self, result: StateChangeReturn) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }
}

/// Completion handle of a queued state change
#[derive(Clone)]
pub struct StateChangeHandle {
    slot: Arc<ResultSlot>,
}

impl StateChangeHandle {
    fn pending() -> Self {
        Self {
            slot: Arc::new(ResultSlot::default()),
        }
    }

    /// A handle that is already resolved
    pub fn completed(result: StateChangeReturn) -> Self {
        let handle = Self::pending();
        handle.slot.complete(result);
        handle
    }

    /// Block until the state change ran
    pub fn wait(&self) -> StateChangeReturn {
        let mut result = self.slot.result.lock();
        loop {
            if let Some(result) = *result {
                return result;
            }
            self.slot.ready.wait(&mut result);
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<StateChangeReturn> {
        let deadline = Instant::now() + timeout;
        let mut result = self.slot.result.lock();
        while result.is_none() {
            if self.slot.ready.wait_until(&mut result, deadline).timed_out() {
                break;
            }
        }
        *result
    }

    pub fn try_result(&self) -> Option<StateChangeReturn> {
        *self.slot.result.lock()
    }
}

struct Job {
    pipeline_id: u32,
    playbin: Arc<dyn Playbin>,
    state: State,
    slot: Arc<ResultSlot>,
}

pub struct SetStatePool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl SetStatePool {
    pub fn new(workers: usize, queue_depth: usize) -> PipelineResult<Self> {
        let (sender, receiver) = bounded::<Job>(queue_depth.max(1));
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(workers),
        };

        for index in 0..workers.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("sonance-setstate-{}", index))
                .spawn(move || {
                    for job in receiver {
                        let result = job.playbin.set_state(job.state);
                        debug!(
                            "Pipeline {}: set_state({}) returned {:?}",
                            job.pipeline_id, job.state, result
                        );
                        job.slot.complete(result);
                    }
                })
                .map_err(|e| PipelineError::WorkerSpawn(e.to_string()))?;
            pool.workers.push(handle);
        }

        Ok(pool)
    }

    /// Queue a state change; never blocks
    ///
    /// A full queue or a stopped pool resolves the handle to `Failure`.
    pub fn submit(
        &self,
        pipeline_id: u32,
        playbin: Arc<dyn Playbin>,
        state: State,
    ) -> StateChangeHandle {
        let Some(sender) = &self.sender else {
            return StateChangeHandle::completed(StateChangeReturn::Failure);
        };
        let handle = StateChangeHandle::pending();
        let job = Job {
            pipeline_id,
            playbin,
            state,
            slot: Arc::clone(&handle.slot),
        };
        match sender.try_send(job) {
            Ok(()) => handle,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Pipeline {}: set-state queue full, dropping change to {}",
                    pipeline_id, state
                );
                StateChangeHandle::completed(StateChangeReturn::Failure)
            }
            Err(TrySendError::Disconnected(_)) => {
                StateChangeHandle::completed(StateChangeReturn::Failure)
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for SetStatePool {
    fn drop(&mut self) {
        // Workers drain the queue and exit once the sender is gone
        self.sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Set-state worker panicked");
            }
        }
    }
}
