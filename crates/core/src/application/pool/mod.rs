// Task Worker Pool
//
// Coordination shim around the external media processor: bounded slot
// admission, cooperative cancellation, progress relay, a processing ceiling
// watchdog, and panic isolation. Workers never touch the job store; every
// observation flows back to the lifecycle manager as a `WorkerEvent`.

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, info};

use crate::domain::{JobId, JobPayload};
use crate::port::cancellation::{cancel_channel, CancelHandle, CancelToken};
use crate::port::{MediaProcessor, ProcessError, ProcessOutcome, ProgressReport};

/// Observation reported by a worker execution
#[derive(Debug)]
pub enum WorkerEvent {
    /// A slot was acquired and the processor was invoked
    Started { job_id: JobId },
    /// Progress side channel report (must not transition status)
    Progress {
        job_id: JobId,
        percent: u8,
        note: Option<String>,
    },
    /// Processor returned success
    Completed {
        job_id: JobId,
        outcome: ProcessOutcome,
    },
    /// Processor returned an error, panicked, or hit the ceiling
    Failed { job_id: JobId, reason: String },
    /// Processor stopped in response to a cancellation request
    Cancelled { job_id: JobId },
}

impl WorkerEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            WorkerEvent::Started { job_id }
            | WorkerEvent::Progress { job_id, .. }
            | WorkerEvent::Completed { job_id, .. }
            | WorkerEvent::Failed { job_id, .. }
            | WorkerEvent::Cancelled { job_id } => job_id,
        }
    }
}

/// Cancel handle for one submission
///
/// The generation distinguishes a retry's fresh registration from the
/// finished execution it replaced under the same job id.
struct Registration {
    generation: u64,
    handle: CancelHandle,
}

pub struct WorkerPool {
    // Fair semaphore: strict FIFO admission into execution slots
    slots: Arc<Semaphore>,
    processor: Arc<dyn MediaProcessor>,
    events_tx: mpsc::Sender<WorkerEvent>,
    ceiling: Duration,
    cancels: Arc<Mutex<HashMap<JobId, Registration>>>,
    next_generation: AtomicU64,
}

impl WorkerPool {
    pub fn new(
        slots: usize,
        ceiling: Duration,
        processor: Arc<dyn MediaProcessor>,
        events_tx: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        info!(slots, ceiling_secs = ceiling.as_secs(), "Worker pool initialized");
        Self {
            slots: Arc::new(Semaphore::new(slots)),
            processor,
            events_tx,
            ceiling,
            cancels: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Submit a job for execution
    ///
    /// Returns immediately; the job waits for a free slot inside its own
    /// task. Exactly one worker task exists per submission.
    pub fn submit(&self, job_id: &JobId, payload: &JobPayload) {
        let job_id = job_id.clone();
        let payload = payload.clone();
        let slots = Arc::clone(&self.slots);
        let processor = Arc::clone(&self.processor);
        let events_tx = self.events_tx.clone();
        let ceiling = self.ceiling;
        let cancels = Arc::clone(&self.cancels);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (handle, token) = cancel_channel();
        cancels
            .lock()
            .expect("cancel map lock poisoned")
            .insert(job_id.clone(), Registration { generation, handle });

        tokio::spawn(async move {
            run_one(
                job_id.clone(),
                payload,
                slots,
                processor,
                events_tx,
                ceiling,
                token,
            )
            .await;
            // A retry may have re-registered this id already; only drop the
            // registration belonging to this execution.
            let mut cancels = cancels.lock().expect("cancel map lock poisoned");
            if cancels
                .get(&job_id)
                .map_or(false, |r| r.generation == generation)
            {
                cancels.remove(&job_id);
            }
        });
    }

    /// Request cancellation
    ///
    /// Returns whether the request was accepted; a job whose worker already
    /// finished (or was never submitted) returns false.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let cancels = self.cancels.lock().expect("cancel map lock poisoned");
        match cancels.get(job_id) {
            Some(registration) => {
                registration.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of submissions whose worker task has not finished yet
    pub fn in_flight(&self) -> usize {
        self.cancels.lock().expect("cancel map lock poisoned").len()
    }
}

async fn run_one(
    job_id: JobId,
    payload: JobPayload,
    slots: Arc<Semaphore>,
    processor: Arc<dyn MediaProcessor>,
    events_tx: mpsc::Sender<WorkerEvent>,
    ceiling: Duration,
    token: CancelToken,
) {
    // Wait for a slot; a cancel while queued means no worker ever runs
    let mut queued_token = token.clone();
    let permit = tokio::select! {
        permit = slots.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return, // pool torn down
        },
        _ = queued_token.cancelled() => {
            debug!(job_id = %job_id, "Cancelled before slot acquisition");
            let _ = events_tx.send(WorkerEvent::Cancelled { job_id }).await;
            return;
        }
    };

    // The cancel may have raced the permit
    if token.is_cancelled() {
        let _ = events_tx.send(WorkerEvent::Cancelled { job_id }).await;
        return;
    }

    let _ = events_tx
        .send(WorkerEvent::Started {
            job_id: job_id.clone(),
        })
        .await;

    // Progress side channel, relayed as events tagged by job id
    let (progress_tx, mut progress_rx) = mpsc::channel::<ProgressReport>(
        constants::PROGRESS_CHANNEL_CAPACITY,
    );
    let relay = {
        let events_tx = events_tx.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move {
            while let Some(report) = progress_rx.recv().await {
                let _ = events_tx
                    .send(WorkerEvent::Progress {
                        job_id: job_id.clone(),
                        percent: report.percent,
                        note: report.note,
                    })
                    .await;
            }
        })
    };

    // Run the processor in its own task: a panicking engine surfaces as a
    // JoinError instead of unwinding the pool.
    let mut work = {
        let token = token.clone();
        tokio::spawn(async move { processor.process(&payload, progress_tx, token).await })
    };

    let event = match tokio::time::timeout(ceiling, &mut work).await {
        Err(_elapsed) => {
            // Supervising ceiling: force-fail a stuck engine
            work.abort();
            WorkerEvent::Failed {
                job_id: job_id.clone(),
                reason: format!(
                    "processing ceiling of {}s exceeded",
                    ceiling.as_secs()
                ),
            }
        }
        Ok(Err(join_err)) => WorkerEvent::Failed {
            job_id: job_id.clone(),
            reason: join_failure_message(join_err),
        },
        Ok(Ok(Err(ProcessError::Cancelled))) => WorkerEvent::Cancelled {
            job_id: job_id.clone(),
        },
        Ok(Ok(Err(err))) => WorkerEvent::Failed {
            job_id: job_id.clone(),
            reason: err.to_string(),
        },
        Ok(Ok(Ok(outcome))) => WorkerEvent::Completed {
            job_id: job_id.clone(),
            outcome,
        },
    };

    // Drain remaining progress reports before the terminal event so
    // per-connection delivery order matches execution order.
    let _ = relay.await;
    let _ = events_tx.send(event).await;

    drop(permit);
}

fn join_failure_message(err: JoinError) -> String {
    if err.is_panic() {
        let panic = err.into_panic();
        let msg = if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        format!("worker panicked: {}", msg)
    } else {
        "worker task aborted".to_string()
    }
}
